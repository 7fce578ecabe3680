//! Tests for `redundancy` module

use super::*;
use crate::model::IndexDirection::{self, Ascending as Asc, Descending as Desc};
use serde_json::json;

fn index(pairs: &[(&str, IndexDirection)]) -> IndexDefinition {
    IndexDefinition::from_key(IndexKeySpec::from_pairs(pairs.iter().copied()))
}

fn names(indexes: &[IndexDefinition]) -> Vec<&str> {
    indexes.iter().map(|i| i.name.as_str()).collect()
}

fn id_index() -> IndexDefinition {
    IndexDefinition::new("_id_", IndexKeySpec::single("_id", Asc))
}

// -------------------------------------------------------------------------
// Prefix subsumption
// -------------------------------------------------------------------------

#[test]
fn test_single_field_prefix_is_removed() {
    // Arrange
    let indexes = vec![index(&[("a", Asc)]), index(&[("a", Asc), ("b", Asc)])];

    // Act
    let reduction = reduce(&indexes);

    // Assert
    assert_eq!(names(&reduction.kept), vec!["a_1_b_1"]);
    assert_eq!(reduction.removed.len(), 1);
    assert_eq!(reduction.removed[0].subsumed_by, "a_1_b_1");
    assert_eq!(
        reduction.warnings,
        vec![Warning::RedundantIndex {
            removed_index: "a_1".into(),
            subsuming_index: "a_1_b_1".into(),
        }]
    );
}

#[test]
fn test_direction_mismatch_keeps_both() {
    let indexes = vec![
        index(&[("a", Asc), ("b", Desc)]),
        index(&[("a", Asc), ("b", Asc)]),
    ];

    let reduction = reduce(&indexes);

    assert_eq!(reduction.kept.len(), 2);
    assert!(reduction.removed.is_empty());
    assert!(reduction.warnings.is_empty());
}

#[test]
fn test_non_prefix_subsequence_is_kept() {
    let indexes = vec![index(&[("b", Asc)]), index(&[("a", Asc), ("b", Asc)])];

    let reduction = reduce(&indexes);

    assert_eq!(reduction.kept.len(), 2);
}

#[test]
fn test_chain_reports_longest_kept_subsumer_once() {
    // Arrange
    let indexes = vec![
        index(&[("a", Asc)]),
        index(&[("a", Asc), ("b", Asc)]),
        index(&[("a", Asc), ("b", Asc), ("c", Asc)]),
        index(&[("a", Asc), ("b", Asc), ("d", Asc)]),
    ];

    // Act
    let reduction = reduce(&indexes);

    // Assert
    assert_eq!(names(&reduction.kept), vec!["a_1_b_1_c_1", "a_1_b_1_d_1"]);
    let removed: Vec<(&str, &str)> = reduction
        .removed
        .iter()
        .map(|r| (r.index.name.as_str(), r.subsumed_by.as_str()))
        .collect();
    assert_eq!(
        removed,
        vec![("a_1", "a_1_b_1_c_1"), ("a_1_b_1", "a_1_b_1_c_1")]
    );
    assert_eq!(reduction.warnings.len(), 2);
}

// -------------------------------------------------------------------------
// Protected indexes
// -------------------------------------------------------------------------

#[test]
fn test_unique_prefix_is_preserved() {
    let indexes = vec![
        index(&[("a", Asc)]).unique(),
        index(&[("a", Asc), ("b", Asc)]),
    ];

    let reduction = reduce(&indexes);

    assert_eq!(reduction.kept.len(), 2);
}

#[test]
fn test_sparse_partial_and_ttl_prefixes_are_preserved() {
    let with = |options: IndexOptions| index(&[("a", Asc)]).with_options(options);
    let indexes = vec![
        with(IndexOptions {
            sparse: true,
            ..IndexOptions::default()
        }),
        with(IndexOptions {
            partial_filter_expression: Some(json!({"a": {"$exists": true}})),
            ..IndexOptions::default()
        }),
        with(IndexOptions {
            expire_after_seconds: Some(60),
            ..IndexOptions::default()
        }),
        index(&[("a", Asc), ("b", Asc)]),
    ];

    let reduction = reduce(&indexes);

    assert_eq!(reduction.kept.len(), 4);
    assert!(reduction.removed.is_empty());
}

#[test]
fn test_id_index_is_never_removed() {
    let indexes = vec![id_index(), index(&[("_id", Asc), ("a", Asc)])];

    let reduction = reduce(&indexes);

    assert_eq!(reduction.kept.len(), 2);
}

#[test]
fn test_shard_key_index_is_never_removed() {
    // Arrange
    let shard_key = ShardKey::ranged("tenant");
    let indexes = vec![
        index(&[("tenant", Asc)]),
        index(&[("tenant", Asc), ("created", Desc)]),
    ];

    // Act
    let protected = RedundancyAnalyzer::new(Some(&shard_key)).reduce(&indexes);
    let unprotected = reduce(&indexes);

    // Assert
    assert_eq!(protected.kept.len(), 2);
    assert_eq!(unprotected.kept.len(), 1);
}

#[test]
fn test_sparse_or_text_superset_cannot_subsume() {
    let sparse_superset = index(&[("a", Asc), ("b", Asc)]).with_options(IndexOptions {
        sparse: true,
        ..IndexOptions::default()
    });
    let text_superset = IndexDefinition::from_key(IndexKeySpec::from_pairs([
        ("a", Asc),
        ("body", IndexDirection::Text),
    ]));

    let reduction = reduce(&[index(&[("a", Asc)]), sparse_superset, text_superset]);

    assert_eq!(reduction.kept.len(), 3);
}

#[test]
fn test_collation_must_match() {
    let french = index(&[("a", Asc), ("b", Asc)]).with_options(IndexOptions {
        collation: Some(json!({"locale": "fr"})),
        ..IndexOptions::default()
    });

    let reduction = reduce(&[index(&[("a", Asc)]), french]);

    assert_eq!(reduction.kept.len(), 2);
}

#[test]
fn test_unique_superset_still_subsumes() {
    let reduction = reduce(&[
        index(&[("a", Asc)]),
        index(&[("a", Asc), ("b", Asc)]).unique(),
    ]);

    assert_eq!(names(&reduction.kept), vec!["a_1_b_1"]);
}

#[test]
fn test_build_hints_do_not_block_subsumption() {
    let mut background = IndexOptions::default();
    background.extra.insert("background".into(), json!(true));

    let reduction = reduce(&[
        index(&[("a", Asc)]),
        index(&[("a", Asc), ("b", Asc)]).with_options(background),
    ]);

    assert_eq!(reduction.kept.len(), 1);
}

// -------------------------------------------------------------------------
// Identical keys
// -------------------------------------------------------------------------

#[test]
fn test_identical_keys_keep_first_declared() {
    let first = IndexDefinition::new("first", IndexKeySpec::single("a", Asc));
    let second = IndexDefinition::new("second", IndexKeySpec::single("a", Asc));

    let reduction = reduce(&[first, second]);

    assert_eq!(names(&reduction.kept), vec!["first"]);
    assert_eq!(reduction.removed[0].subsumed_by, "first");
}

#[test]
fn test_identical_keys_with_conflicting_unique_flag_warn_and_keep_both() {
    // Arrange
    let plain = IndexDefinition::new("plain", IndexKeySpec::single("a", Asc));
    let unique = IndexDefinition::new("uniq", IndexKeySpec::single("a", Asc)).unique();

    // Act
    let reduction = reduce(&[plain, unique]);

    // Assert
    assert_eq!(names(&reduction.kept), vec!["plain", "uniq"]);
    assert_eq!(
        reduction.warnings,
        vec![Warning::RedundancyConflict {
            first_index: "plain".into(),
            second_index: "uniq".into(),
            differing_options: vec!["unique".into()],
        }]
    );
}

#[test]
fn test_conflicting_identical_keys_survive_a_wider_index() {
    // Arrange
    let plain = IndexDefinition::new("a_plain", IndexKeySpec::single("a", Asc));
    let unique = IndexDefinition::new("a_unique", IndexKeySpec::single("a", Asc)).unique();
    let wider = index(&[("a", Asc), ("b", Asc)]);

    // Act
    let reduction = reduce(&[plain, unique, wider]);

    // Assert
    assert_eq!(names(&reduction.kept), vec!["a_plain", "a_unique", "a_1_b_1"]);
    assert!(reduction.removed.is_empty());
    assert_eq!(
        reduction.warnings,
        vec![Warning::RedundancyConflict {
            first_index: "a_plain".into(),
            second_index: "a_unique".into(),
            differing_options: vec!["unique".into()],
        }]
    );
}

#[test]
fn test_duplicate_inside_conflicting_group_is_still_removed() {
    let plain = IndexDefinition::new("a_plain", IndexKeySpec::single("a", Asc));
    let twin = IndexDefinition::new("a_twin", IndexKeySpec::single("a", Asc));
    let unique = IndexDefinition::new("a_unique", IndexKeySpec::single("a", Asc)).unique();
    let wider = index(&[("a", Asc), ("b", Asc)]);

    let reduction = reduce(&[plain, twin, unique, wider]);

    assert_eq!(names(&reduction.kept), vec!["a_plain", "a_unique", "a_1_b_1"]);
    assert_eq!(reduction.removed.len(), 1);
    assert_eq!(reduction.removed[0].index.name, "a_twin");
    assert_eq!(reduction.removed[0].subsumed_by, "a_plain");
}

#[test]
fn test_identity_reduction_keeps_everything() {
    let indexes = vec![index(&[("a", Asc)]), index(&[("a", Asc), ("b", Asc)])];

    let reduction = Reduction::identity(&indexes);

    assert_eq!(reduction.kept, indexes);
    assert!(reduction.removed.is_empty());
    assert!(reduction.warnings.is_empty());
}

// -------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn direction_strategy() -> impl Strategy<Value = IndexDirection> {
        prop_oneof![Just(Asc), Just(Desc), Just(IndexDirection::Hashed)]
    }

    fn index_strategy() -> impl Strategy<Value = IndexDefinition> {
        (
            proptest::collection::vec(
                (prop_oneof![Just("a"), Just("b"), Just("c"), Just("d")], direction_strategy()),
                1usize..=3,
            ),
            any::<bool>(),
            any::<bool>(),
            0usize..1000,
        )
            .prop_map(|(pairs, unique, sparse, tag)| {
                let mut seen = std::collections::BTreeSet::new();
                let key: IndexKeySpec = IndexKeySpec::from_pairs(
                    pairs.into_iter().filter(|(field, _)| seen.insert(*field)),
                );
                let name = format!("{}_{tag}", key.default_name());
                IndexDefinition::new(name, key).with_options(IndexOptions {
                    unique,
                    sparse,
                    ..IndexOptions::default()
                })
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: reducing a reduced set changes nothing
        #[test]
        fn prop_reduce_is_idempotent(indexes in proptest::collection::vec(index_strategy(), 0usize..8)) {
            let once = reduce(&indexes);
            let twice = reduce(&once.kept);

            prop_assert_eq!(&twice.kept, &once.kept);
            prop_assert!(twice.removed.is_empty());
        }

        /// Property: kept and removed partition the input
        #[test]
        fn prop_partition_is_complete(indexes in proptest::collection::vec(index_strategy(), 0usize..8)) {
            let reduction = reduce(&indexes);

            prop_assert_eq!(reduction.kept.len() + reduction.removed.len(), indexes.len());
            for removed in &reduction.removed {
                prop_assert!(reduction.kept.iter().any(|k| k.name == removed.subsumed_by));
            }
        }

        /// Property: unique indexes survive unless an identical one is kept
        #[test]
        fn prop_unique_constraints_survive(indexes in proptest::collection::vec(index_strategy(), 0usize..8)) {
            let reduction = reduce(&indexes);

            for original in indexes.iter().filter(|i| i.options.unique) {
                let still_enforced = reduction
                    .kept
                    .iter()
                    .any(|k| k.key == original.key && k.options == original.options);
                prop_assert!(still_enforced);
            }
        }

        /// Property: same input, same output
        #[test]
        fn prop_reduce_is_deterministic(indexes in proptest::collection::vec(index_strategy(), 0usize..8)) {
            prop_assert_eq!(reduce(&indexes), reduce(&indexes));
        }
    }
}
