use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Tags attached to a record: each key maps to one or more string values.
///
/// Keys are kept sorted so that encoded documents are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCollection(BTreeMap<String, Vec<String>>);

impl TagCollection {
    /// Creates an empty tag collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` under `key`, keeping any values already present.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Chainable variant of [`TagCollection::add`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// Values stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Iterates over every `(key, value)` pair, one per value.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Iterates over the tag keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// True when no tag is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A unit of stored knowledge: an id, its embedding, filterable tags and an opaque payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique within an index.
    pub id: String,
    /// Embedding; its length must match the index vector size.
    #[serde(default)]
    pub vector: Vec<f32>,
    #[serde(default)]
    pub tags: TagCollection,
    #[serde(default)]
    pub payload: HashMap<String, String>,
}

impl MemoryRecord {
    /// Creates a record with the given id and embedding, no tags and an empty payload.
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            tags: TagCollection::new(),
            payload: HashMap::new(),
        }
    }

    /// Adds a tag value. Chainable.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.add(key, value);
        self
    }

    /// Sets a payload entry. Chainable.
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// A single tag equality test inside a [`MemoryFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConstraint {
    pub key: String,
    pub value: String,
    /// Match records that do *not* carry this tag value.
    #[serde(default)]
    pub negate: bool,
}

/// A conjunction of tag constraints.
///
/// A slice of filters is read as a disjunction: a record matches when it
/// satisfies every constraint of at least one filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFilter {
    constraints: Vec<TagConstraint>,
}

impl MemoryFilter {
    /// Creates a filter without constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `key` to carry `value`.
    pub fn by_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.push(TagConstraint {
            key: key.into(),
            value: value.into(),
            negate: false,
        });
        self
    }

    /// Requires `key` not to carry `value`.
    pub fn not_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.push(TagConstraint {
            key: key.into(),
            value: value.into(),
            negate: true,
        });
        self
    }

    pub fn constraints(&self) -> &[TagConstraint] {
        &self.constraints
    }

    /// Empty filters carry no constraint and are ignored by stores.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
