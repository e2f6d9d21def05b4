//! Data types for index records and retrieval results.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

/// Metadata key prefix marking an ingredient tag (`ingredienttag:chicken`).
pub const INGREDIENT_TAG_PREFIX: &str = "ingredienttag:";
/// Metadata key prefix marking a special-diet tag (`specialdiettag:grain-free`).
pub const SPECIAL_DIET_TAG_PREFIX: &str = "specialdiettag:";
/// Metadata key prefix marking a category tag.
pub const CATEGORY_TAG_PREFIX: &str = "categorytag:";

/// A scalar metadata value as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Numeric view of the value. Strings are parsed; booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if f.is_finite() => Some(*f),
            Self::Str(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness as the index writer encodes flags: `true`, non-zero, or `"true"`/`"1"`/`"yes"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Key to scalar metadata of one index record.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Non-empty string value for `key`.
pub fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(MetadataValue::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Tag names under `prefix`. Tag membership is encoded by key presence.
pub fn tag_values<'a>(metadata: &'a Metadata, prefix: &'a str) -> impl Iterator<Item = &'a str> {
    metadata
        .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
        .map(move |(key, _)| &key[prefix.len()..])
}

/// A record stored in a vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Record id. Product records use the product id, optionally with a
    /// `_<n>` suffix when one product has several records.
    pub id: String,
    /// The indexed text (review synthesis for products, body for articles).
    pub document: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Result of a vector query: four parallel lists ordered by ascending distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub ids: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub documents: Vec<String>,
    /// Cosine distances, smaller is closer.
    pub distances: Vec<f32>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn push(&mut self, id: String, metadata: Metadata, document: String, distance: f32) {
        self.ids.push(id);
        self.metadatas.push(metadata);
        self.documents.push(document);
        self.distances.push(distance);
    }

    /// Keep only entries whose id and metadata satisfy `keep`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Metadata) -> bool) {
        let mut out = Self::empty();
        let entries = self
            .ids
            .drain(..)
            .zip(self.metadatas.drain(..))
            .zip(self.documents.drain(..))
            .zip(self.distances.drain(..).map(Some).chain(std::iter::repeat(None)));
        for (((id, metadata), document), distance) in entries {
            if keep(&id, &metadata) {
                out.push(id, metadata, document, distance.unwrap_or(1.0));
            }
        }
        *self = out;
    }
}
