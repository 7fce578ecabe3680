//! Tests for `model` module

use super::*;
use serde_json::json;

// -------------------------------------------------------------------------
// IndexKeySpec
// -------------------------------------------------------------------------

#[test]
fn test_key_spec_preserves_declared_order() {
    // Arrange
    let raw = r#"{"zeta": 1, "alpha": -1, "mid": "hashed"}"#;

    // Act
    let key: IndexKeySpec = serde_json::from_str(raw).expect("parse key");

    // Assert
    let names: Vec<&str> = key.fields().iter().map(|f| f.field.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(key.fields()[1].direction, IndexDirection::Descending);
    assert_eq!(key.fields()[2].direction, IndexDirection::Hashed);
}

#[test]
fn test_key_spec_accepts_pair_list_and_float_directions() {
    let key: IndexKeySpec =
        serde_json::from_value(json!([["a", 1.0], ["b", -1], ["loc", "2dsphere"]])).expect("parse");

    assert_eq!(
        key,
        IndexKeySpec::from_pairs([
            ("a", IndexDirection::Ascending),
            ("b", IndexDirection::Descending),
            ("loc", IndexDirection::Geo2dSphere),
        ])
    );
}

#[test]
fn test_key_spec_rejects_unknown_direction() {
    let result: std::result::Result<IndexKeySpec, _> = serde_json::from_value(json!({"a": 2}));
    assert!(result.is_err());

    let result: std::result::Result<IndexKeySpec, _> =
        serde_json::from_value(json!({"a": "wildcard"}));
    assert!(result.is_err());
}

#[test]
fn test_key_spec_rejects_empty_and_repeated_fields() {
    let empty: std::result::Result<IndexKeySpec, _> = serde_json::from_value(json!({}));
    assert!(empty.is_err());

    let repeated: std::result::Result<IndexKeySpec, _> =
        serde_json::from_value(json!([["a", 1], ["a", -1]]));
    assert!(repeated.is_err());
}

#[test]
fn test_key_spec_serializes_in_order() {
    let key = IndexKeySpec::from_pairs([
        ("b", IndexDirection::Ascending),
        ("a", IndexDirection::Text),
    ]);

    let text = serde_json::to_string(&key).expect("serialize");

    assert_eq!(text, r#"{"b":1,"a":"text"}"#);
}

#[test]
fn test_strict_prefix_compares_direction() {
    let a = IndexKeySpec::single("a", IndexDirection::Ascending);
    let ab = IndexKeySpec::from_pairs([
        ("a", IndexDirection::Ascending),
        ("b", IndexDirection::Ascending),
    ]);
    let a_desc_b = IndexKeySpec::from_pairs([
        ("a", IndexDirection::Descending),
        ("b", IndexDirection::Ascending),
    ]);

    assert!(a.is_strict_prefix_of(&ab));
    assert!(!ab.is_strict_prefix_of(&ab));
    assert!(!ab.is_strict_prefix_of(&a));
    assert!(!a.is_strict_prefix_of(&a_desc_b));
}

#[test]
fn test_default_name_and_display() {
    let key = IndexKeySpec::from_pairs([
        ("a", IndexDirection::Ascending),
        ("b", IndexDirection::Descending),
        ("c", IndexDirection::Hashed),
    ]);

    assert_eq!(key.default_name(), "a_1_b_-1_c_hashed");
    assert_eq!(key.to_string(), r#"{a: 1, b: -1, c: "hashed"}"#);
}

// -------------------------------------------------------------------------
// IndexDefinition
// -------------------------------------------------------------------------

#[test]
fn test_index_definition_reads_engine_index_info() {
    // Arrange
    let raw = json!({
        "name": "expiry",
        "key": {"createdAt": 1},
        "v": 2,
        "expireAfterSeconds": 3600,
        "background": true
    });

    // Act
    let index: IndexDefinition = serde_json::from_value(raw).expect("parse index");
    let collection = SourceCollection::new(CollectionId::new("db", "c")).with_index(index);

    // Assert
    let index = &collection.indexes[0];
    assert_eq!(index.options.expire_after_seconds, Some(3600));
    assert!(!index.options.extra.contains_key("v"));
    assert_eq!(index.options.extra.get("background"), Some(&json!(true)));
}

#[test]
fn test_id_index_detection() {
    let by_name = IndexDefinition::new("_id_", IndexKeySpec::single("_id", IndexDirection::Ascending));
    let hashed_id = IndexDefinition::new("_id_hashed", IndexKeySpec::single("_id", IndexDirection::Hashed));
    let other = IndexDefinition::from_key(IndexKeySpec::single("a", IndexDirection::Ascending));

    assert!(by_name.is_id_index());
    assert!(!hashed_id.is_id_index());
    assert!(!other.is_id_index());
}

#[test]
fn test_ts_ttl_detection() {
    let ttl_ts = IndexDefinition::from_key(IndexKeySpec::single("_ts", IndexDirection::Ascending))
        .with_options(IndexOptions {
            expire_after_seconds: Some(10),
            ..IndexOptions::default()
        });
    let ttl_other = IndexDefinition::from_key(IndexKeySpec::single("abc", IndexDirection::Ascending))
        .with_options(IndexOptions {
            expire_after_seconds: Some(10),
            ..IndexOptions::default()
        });
    let plain_ts = IndexDefinition::from_key(IndexKeySpec::single("_ts", IndexDirection::Ascending));

    assert!(ttl_ts.is_ts_ttl());
    assert!(!ttl_other.is_ts_ttl());
    assert!(!plain_ts.is_ts_ttl());
}

// -------------------------------------------------------------------------
// ShardKey
// -------------------------------------------------------------------------

#[test]
fn test_shard_key_from_bare_field_is_hashed() {
    let key: ShardKey = serde_json::from_value(json!("_id")).expect("parse");

    assert_eq!(key.field(), "_id");
    assert_eq!(key.kind(), ShardKeyKind::Hashed);
    assert_eq!(serde_json::to_value(&key).expect("serialize"), json!({"_id": "hashed"}));
}

#[test]
fn test_shard_key_from_ranged_spec() {
    let key: ShardKey = serde_json::from_value(json!({"tenant": 1})).expect("parse");

    assert_eq!(key.kind(), ShardKeyKind::Ranged);
    assert_eq!(key, ShardKey::ranged("tenant"));
}

#[test]
fn test_shard_key_rejects_compound_and_text() {
    let compound: std::result::Result<ShardKey, _> =
        serde_json::from_value(json!({"a": 1, "b": 1}));
    let text: std::result::Result<ShardKey, _> = serde_json::from_value(json!({"a": "text"}));

    assert!(compound.is_err());
    assert!(text.is_err());
}

// -------------------------------------------------------------------------
// SourceSnapshot
// -------------------------------------------------------------------------

#[test]
fn test_snapshot_rejects_duplicates() {
    let id = CollectionId::new("db", "c");

    let result = SourceSnapshot::from_collections([
        SourceCollection::new(id.clone()),
        SourceCollection::new(id),
    ]);

    assert!(matches!(result, Err(Error::InvalidMetadata(_))));
}

#[test]
fn test_snapshot_iterates_in_identity_order() {
    let snapshot = SourceSnapshot::from_collections([
        SourceCollection::new(CollectionId::new("db2", "a")),
        SourceCollection::new(CollectionId::new("db1", "z")),
        SourceCollection::new(CollectionId::new("db1", "b")),
    ])
    .expect("snapshot");

    let order: Vec<String> = snapshot.collections().map(|c| c.id.to_string()).collect();

    assert_eq!(order, vec!["db1.b", "db1.z", "db2.a"]);
}

#[test]
fn test_known_anchor_counts_as_existing() {
    let mut snapshot = SourceSnapshot::new();
    let anchor = CollectionId::new("db", "anchor");
    assert!(!snapshot.contains(&anchor));

    snapshot.add_known_anchor(anchor.clone());

    assert!(snapshot.contains(&anchor));
    assert!(snapshot.get(&anchor).is_none());
    assert_eq!(snapshot.known_anchors().count(), 1);
}
