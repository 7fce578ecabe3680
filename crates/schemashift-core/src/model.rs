//! Source schema model: collections, index definitions and shard keys.
//!
//! Index keys keep their declared field order: the redundancy analyzer
//! depends on it, so [`IndexKeySpec`] is read from JSON objects member by
//! member rather than through an unordered map.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};

/// Name of the implicit primary key field.
pub const ID_FIELD: &str = "_id";

/// Name the engine gives to the implicit `_id` index.
pub const ID_INDEX_NAME: &str = "_id_";

/// RU system timestamp field. It does not exist on vCore deployments.
pub const TS_FIELD: &str = "_ts";

/// Option keys that describe the source index build rather than the index.
const INTERNAL_OPTION_KEYS: &[&str] = &["v", "ns"];

/// Fully qualified collection name. Ordered by database, then collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId {
    /// Database name.
    pub database: String,
    /// Collection name (may contain dots).
    pub collection: String,
}

impl CollectionId {
    /// Creates a collection identity.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Returns the collection named `collection` in the same database.
    #[must_use]
    pub fn sibling(&self, collection: &str) -> Self {
        Self::new(self.database.clone(), collection)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Direction (or type) of one index key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDirection", into = "RawDirection")]
pub enum IndexDirection {
    /// `1`
    Ascending,
    /// `-1`
    Descending,
    /// `"text"`
    Text,
    /// `"hashed"`
    Hashed,
    /// `"2d"`
    Geo2d,
    /// `"2dsphere"`
    Geo2dSphere,
}

impl IndexDirection {
    /// Ascending or descending.
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        matches!(self, Self::Ascending | Self::Descending)
    }

    /// Text and geo indexes skip documents that lack the field.
    #[must_use]
    pub const fn is_implicitly_sparse(self) -> bool {
        matches!(self, Self::Text | Self::Geo2d | Self::Geo2dSphere)
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Ascending => "1",
            Self::Descending => "-1",
            Self::Text => "text",
            Self::Hashed => "hashed",
            Self::Geo2d => "2d",
            Self::Geo2dSphere => "2dsphere",
        }
    }
}

impl fmt::Display for IndexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDirection {
    Integer(i64),
    Float(f64),
    Name(String),
}

impl TryFrom<RawDirection> for IndexDirection {
    type Error = String;

    #[allow(clippy::float_cmp)]
    fn try_from(raw: RawDirection) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawDirection::Integer(1) => Ok(Self::Ascending),
            RawDirection::Integer(-1) => Ok(Self::Descending),
            RawDirection::Float(f) if f == 1.0 => Ok(Self::Ascending),
            RawDirection::Float(f) if f == -1.0 => Ok(Self::Descending),
            RawDirection::Name(name) => match name.as_str() {
                "text" => Ok(Self::Text),
                "hashed" => Ok(Self::Hashed),
                "2d" => Ok(Self::Geo2d),
                "2dsphere" => Ok(Self::Geo2dSphere),
                other => Err(format!("unknown index type '{other}'")),
            },
            RawDirection::Integer(n) => Err(format!("invalid index direction {n}")),
            RawDirection::Float(f) => Err(format!("invalid index direction {f}")),
        }
    }
}

impl From<IndexDirection> for RawDirection {
    fn from(direction: IndexDirection) -> Self {
        match direction {
            IndexDirection::Ascending => Self::Integer(1),
            IndexDirection::Descending => Self::Integer(-1),
            other => Self::Name(other.suffix().to_string()),
        }
    }
}

/// One `(field path, direction)` pair of an index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexField {
    /// Dotted field path.
    pub field: String,
    /// Direction or index type.
    pub direction: IndexDirection,
}

/// Ordered index key. Field order defines prefix relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IndexKeySpec(Vec<IndexField>);

impl IndexKeySpec {
    /// Builds a key from `(field, direction)` pairs, in order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, IndexDirection)>,
        S: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(field, direction)| IndexField {
                field: field.into(),
                direction,
            })
            .collect()
    }

    /// Single-field key.
    pub fn single(field: impl Into<String>, direction: IndexDirection) -> Self {
        Self::from_pairs([(field, direction)])
    }

    /// Key fields in declared order.
    #[must_use]
    pub fn fields(&self) -> &[IndexField] {
        &self.0
    }

    /// Number of key fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for an empty key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` is a proper prefix of `other`, comparing field paths
    /// and directions position by position.
    #[must_use]
    pub fn is_strict_prefix_of(&self, other: &Self) -> bool {
        self.len() < other.len() && other.0.starts_with(&self.0)
    }

    /// True when any field is a text or geo key.
    #[must_use]
    pub fn is_implicitly_sparse(&self) -> bool {
        self.0.iter().any(|f| f.direction.is_implicitly_sparse())
    }

    /// True when the key references `field` at any position.
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.iter().any(|f| f.field == field)
    }

    /// Default index name, e.g. `a_1_b_-1`.
    #[must_use]
    pub fn default_name(&self) -> String {
        self.0
            .iter()
            .map(|f| format!("{}_{}", f.field, f.direction))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl FromIterator<IndexField> for IndexKeySpec {
    fn from_iter<T: IntoIterator<Item = IndexField>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for IndexKeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match field.direction {
                IndexDirection::Ascending | IndexDirection::Descending => {
                    write!(f, "{}: {}", field.field, field.direction)?;
                }
                _ => write!(f, "{}: \"{}\"", field.field, field.direction)?,
            }
        }
        f.write_str("}")
    }
}

impl Serialize for IndexKeySpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in &self.0 {
            map.serialize_entry(&field.field, &field.direction)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for IndexKeySpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeySpecVisitor;

        impl<'de> Visitor<'de> for KeySpecVisitor {
            type Value = IndexKeySpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an index key object or a list of [field, direction] pairs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some((field, direction)) = map.next_entry::<String, IndexDirection>()? {
                    fields.push(IndexField { field, direction });
                }
                finish(fields)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some((field, direction)) = seq.next_element::<(String, IndexDirection)>()? {
                    fields.push(IndexField { field, direction });
                }
                finish(fields)
            }
        }

        fn finish<E: de::Error>(fields: Vec<IndexField>) -> std::result::Result<IndexKeySpec, E> {
            if fields.is_empty() {
                return Err(E::custom("index key must name at least one field"));
            }
            let mut seen = BTreeSet::new();
            for f in &fields {
                if !seen.insert(f.field.as_str()) {
                    return Err(E::custom(format!("field '{}' appears twice in index key", f.field)));
                }
            }
            Ok(IndexKeySpec(fields))
        }

        deserializer.deserialize_any(KeySpecVisitor)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Non-key index options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOptions {
    /// Unique constraint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// Sparse index (skips documents lacking the key).
    #[serde(default, skip_serializing_if = "is_false")]
    pub sparse: bool,
    /// TTL in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<i64>,
    /// Partial index filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_filter_expression: Option<serde_json::Value>,
    /// Collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<serde_json::Value>,
    /// Any other option, carried to the target unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl IndexOptions {
    /// True when the index carries a TTL.
    #[must_use]
    pub fn has_ttl(&self) -> bool {
        self.expire_after_seconds.is_some()
    }

    /// True when some documents are deliberately left out of the index.
    #[must_use]
    pub fn restricts_coverage(&self) -> bool {
        self.sparse || self.partial_filter_expression.is_some()
    }

    /// Drops build metadata such as the index version.
    pub fn strip_internal(&mut self) {
        for key in INTERNAL_OPTION_KEYS {
            self.extra.remove(*key);
        }
    }
}

/// A named index with its key and options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Ordered key.
    pub key: IndexKeySpec,
    /// Options.
    #[serde(flatten)]
    pub options: IndexOptions,
}

impl IndexDefinition {
    /// Index with default options.
    pub fn new(name: impl Into<String>, key: IndexKeySpec) -> Self {
        Self {
            name: name.into(),
            key,
            options: IndexOptions::default(),
        }
    }

    /// Index named after its key.
    #[must_use]
    pub fn from_key(key: IndexKeySpec) -> Self {
        Self::new(key.default_name(), key)
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Marks the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    /// The implicit `_id` index.
    #[must_use]
    pub fn is_id_index(&self) -> bool {
        self.name == ID_INDEX_NAME
            || matches!(
                self.key.fields(),
                [only] if only.field == ID_FIELD && only.direction == IndexDirection::Ascending
            )
    }

    /// A TTL index on the RU `_ts` system field.
    #[must_use]
    pub fn is_ts_ttl(&self) -> bool {
        self.options.has_ttl() && self.key.contains_field(TS_FIELD)
    }
}

/// Hashed or ranged sharding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardKeyKind {
    /// Hash-partitioned.
    Hashed,
    /// Range-partitioned.
    Ranged,
}

/// Single-field shard key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawShardKey", into = "IndexKeySpec")]
pub struct ShardKey {
    field: String,
    direction: IndexDirection,
}

impl ShardKey {
    /// Hashed shard key on `field`.
    pub fn hashed(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: IndexDirection::Hashed,
        }
    }

    /// Ascending ranged shard key on `field`.
    pub fn ranged(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: IndexDirection::Ascending,
        }
    }

    /// Sharded field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Hashed or ranged.
    #[must_use]
    pub fn kind(&self) -> ShardKeyKind {
        if self.direction == IndexDirection::Hashed {
            ShardKeyKind::Hashed
        } else {
            ShardKeyKind::Ranged
        }
    }

    /// The key as an index key.
    #[must_use]
    pub fn key_spec(&self) -> IndexKeySpec {
        IndexKeySpec::single(self.field.clone(), self.direction)
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key_spec().fmt(f)
    }
}

impl TryFrom<IndexKeySpec> for ShardKey {
    type Error = Error;

    fn try_from(key: IndexKeySpec) -> Result<Self> {
        match key.fields() {
            [only] if only.direction.is_ordered() || only.direction == IndexDirection::Hashed => {
                Ok(Self {
                    field: only.field.clone(),
                    direction: only.direction,
                })
            }
            [only] => Err(Error::InvalidMetadata(format!(
                "shard key on '{}' cannot use index type '{}'",
                only.field, only.direction
            ))),
            _ => Err(Error::InvalidMetadata(format!(
                "shard key must have exactly one field, got {key}"
            ))),
        }
    }
}

impl From<ShardKey> for IndexKeySpec {
    fn from(key: ShardKey) -> Self {
        key.key_spec()
    }
}

/// RU accounts report a bare field name; those keys are always hashed.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawShardKey {
    Field(String),
    Key(IndexKeySpec),
}

impl TryFrom<RawShardKey> for ShardKey {
    type Error = Error;

    fn try_from(raw: RawShardKey) -> Result<Self> {
        match raw {
            RawShardKey::Field(field) if field.is_empty() => {
                Err(Error::InvalidMetadata("shard key field is empty".to_string()))
            }
            RawShardKey::Field(field) => Ok(Self::hashed(field)),
            RawShardKey::Key(key) => Self::try_from(key),
        }
    }
}

/// Optional statistics supplied by the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of documents.
    #[serde(default)]
    pub document_count: Option<u64>,
    /// Number of distinct shard key values.
    #[serde(default)]
    pub distinct_shard_key_values: Option<u64>,
}

/// Everything the engine knows about one source collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCollection {
    /// Identity.
    pub id: CollectionId,
    /// Indexes, in source order.
    pub indexes: Vec<IndexDefinition>,
    /// Shard key, if the collection is sharded.
    pub shard_key: Option<ShardKey>,
    /// Statistics, if the catalog supplied them.
    pub stats: Option<CollectionStats>,
}

impl SourceCollection {
    /// Unsharded collection with no indexes.
    #[must_use]
    pub fn new(id: CollectionId) -> Self {
        Self {
            id,
            indexes: Vec::new(),
            shard_key: None,
            stats: None,
        }
    }

    /// Appends an index.
    #[must_use]
    pub fn with_index(mut self, mut index: IndexDefinition) -> Self {
        index.options.strip_internal();
        self.indexes.push(index);
        self
    }

    /// Appends indexes in order.
    #[must_use]
    pub fn with_indexes(self, indexes: impl IntoIterator<Item = IndexDefinition>) -> Self {
        indexes.into_iter().fold(self, Self::with_index)
    }

    /// Sets the shard key.
    #[must_use]
    pub fn with_shard_key(mut self, key: ShardKey) -> Self {
        self.shard_key = Some(key);
        self
    }

    /// Sets the statistics.
    #[must_use]
    pub fn with_stats(mut self, stats: CollectionStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Complete source metadata for one run.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    collections: BTreeMap<CollectionId, SourceCollection>,
    known_anchors: BTreeSet<CollectionId>,
}

impl SourceSnapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot, rejecting duplicate identities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMetadata`] if a collection appears twice.
    pub fn from_collections(collections: impl IntoIterator<Item = SourceCollection>) -> Result<Self> {
        let mut snapshot = Self::new();
        for collection in collections {
            snapshot.insert(collection)?;
        }
        Ok(snapshot)
    }

    /// Adds a collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMetadata`] if the collection is already present.
    pub fn insert(&mut self, collection: SourceCollection) -> Result<()> {
        if self.collections.contains_key(&collection.id) {
            return Err(Error::InvalidMetadata(format!(
                "collection {} listed twice",
                collection.id
            )));
        }
        self.known_anchors.remove(&collection.id);
        self.collections.insert(collection.id.clone(), collection);
        Ok(())
    }

    /// Records a collection that exists in the source but was not listed.
    pub fn add_known_anchor(&mut self, id: CollectionId) {
        if !self.collections.contains_key(&id) {
            self.known_anchors.insert(id);
        }
    }

    /// True if the collection is known to exist in the source.
    #[must_use]
    pub fn contains(&self, id: &CollectionId) -> bool {
        self.collections.contains_key(id) || self.known_anchors.contains(id)
    }

    /// Listed collection by identity.
    #[must_use]
    pub fn get(&self, id: &CollectionId) -> Option<&SourceCollection> {
        self.collections.get(id)
    }

    /// Listed collections in `(database, collection)` order.
    pub fn collections(&self) -> impl Iterator<Item = &SourceCollection> {
        self.collections.values()
    }

    /// Known anchors without metadata.
    pub fn known_anchors(&self) -> impl Iterator<Item = &CollectionId> {
        self.known_anchors.iter()
    }

    /// Number of listed collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// True when nothing was listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
