//! End-to-end properties of plan building.
//!
//! Run with: `cargo test -p schemashift-core --test plan_properties`

#![allow(clippy::pedantic)]

use proptest::prelude::*;
use schemashift_core::{
    build, CollectionId, ColocationError, Error, IndexDefinition, IndexDirection, IndexKeySpec,
    SectionConfig, SectionsDocument, ShardKey, SourceCollection, SourceSnapshot,
};

fn index(pairs: &[(&str, IndexDirection)]) -> IndexDefinition {
    IndexDefinition::from_key(IndexKeySpec::from_pairs(pairs.iter().copied()))
}

/// Three databases, a mix of sharded and unsharded collections.
fn fixture() -> SourceSnapshot {
    use IndexDirection::{Ascending as Asc, Descending as Desc};
    SourceSnapshot::from_collections([
        SourceCollection::new(CollectionId::new("db1", "coll1"))
            .with_shard_key(ShardKey::hashed("userId"))
            .with_indexes([
                index(&[("a", Asc)]),
                index(&[("a", Asc), ("b", Asc)]),
                index(&[("email", Asc)]).unique(),
            ]),
        SourceCollection::new(CollectionId::new("db1", "coll2"))
            .with_indexes([index(&[("a", Asc), ("b", Desc)]), index(&[("a", Asc), ("b", Asc)])]),
        SourceCollection::new(CollectionId::new("db2", "any")),
        SourceCollection::new(CollectionId::new("db2", "audit")).with_index(index(&[("at", Desc)])),
        SourceCollection::new(CollectionId::new("db3", "anchor")),
    ])
    .expect("fixture")
}

#[test]
fn test_catch_all_with_override_document() {
    // Arrange
    let document = SectionsDocument::from_json_str(
        r#"{"sections": [
            {"include": ["*"], "exclude": ["db1.*"]},
            {"include": ["db1.coll1"], "migrate_shard_key": "true", "optimize_compound_indexes": "true"}
        ]}"#,
    )
    .expect("document");

    // Act
    let plan = build(&document.sections, &fixture()).expect("plan");

    // Assert
    let coll1 = plan.get(&CollectionId::new("db1", "coll1")).expect("coll1");
    assert_eq!(coll1.section, 1);
    assert_eq!(coll1.shard_key, Some(ShardKey::hashed("userId")));
    let names: Vec<&str> = coll1.indexes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a_1_b_1", "email_1"]);
    assert!(plan.get(&CollectionId::new("db1", "coll2")).is_none());
    assert_eq!(
        plan.get(&CollectionId::new("db2", "any")).expect("any").section,
        0
    );
}

#[test]
fn test_direction_mismatch_survives_optimisation() {
    let sections = vec![SectionConfig::including(["db1.coll2"]).optimize_compound_indexes(true)];

    let plan = build(&sections, &fixture()).expect("plan");

    assert_eq!(plan.entries()[0].indexes.len(), 2);
}

#[test]
fn test_ghost_anchor_produces_no_plan() {
    let sections = vec![SectionConfig::including(["db2.*"]).co_locate_with("ghost")];

    let result = build(&sections, &fixture());

    match result {
        Err(Error::Colocation(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors
                .iter()
                .all(|e| matches!(e, ColocationError::MissingAnchor { .. })));
        }
        other => panic!("expected colocation error, got {other:?}"),
    }
}

#[test]
fn test_execution_order_creates_anchor_first() {
    // Arrange: "any" sorts before "audit" but is anchored on it.
    let sections = vec![
        SectionConfig::including(["db2.*"]),
        SectionConfig::including(["db2.any"]).co_locate_with("audit"),
    ];

    // Act
    let plan = build(&sections, &fixture()).expect("plan");

    // Assert
    let order: Vec<String> = plan
        .execution_order()
        .iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(order, vec!["db2.audit", "db2.any"]);
}

#[test]
fn test_two_builds_serialize_identically() {
    let sections = vec![
        SectionConfig::including(["*"]).optimize_compound_indexes(true),
        SectionConfig::including(["db1.*"]).migrate_shard_key(true).drop_if_exists(true),
        SectionConfig::including(["db2.any"]).co_locate_with("audit"),
    ];

    let first = serde_json::to_string(&build(&sections, &fixture()).expect("plan")).expect("json");
    let second = serde_json::to_string(&build(&sections, &fixture()).expect("plan")).expect("json");

    assert_eq!(first, second);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: snapshot insertion order never changes the plan
    #[test]
    fn prop_plan_independent_of_insertion_order(reverse in any::<bool>(), optimise in any::<bool>()) {
        let mut collections: Vec<SourceCollection> = fixture().collections().cloned().collect();
        if reverse {
            collections.reverse();
        }
        let shuffled = SourceSnapshot::from_collections(collections).expect("snapshot");
        let sections = vec![SectionConfig::including(["*"]).optimize_compound_indexes(optimise)];

        let expected = serde_json::to_string(&build(&sections, &fixture()).expect("plan")).expect("json");
        let actual = serde_json::to_string(&build(&sections, &shuffled).expect("plan")).expect("json");

        prop_assert_eq!(expected, actual);
    }
}
