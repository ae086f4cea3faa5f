//! Secondary index definitions and query results.
//!
//! An [`IndexDefinition`] names an index, the hash-key prefix it covers
//! and the schema of indexed fields. Definitions are persisted by the store
//! with bincode, so every type here is `Serialize + Deserialize`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field values of one stored hash, keyed by field name.
///
/// Values are raw bytes: text and numeric fields hold UTF-8, vector fields
/// hold packed little-endian `f32` blobs.
pub type HashFields = BTreeMap<String, Vec<u8>>;

/// Distance metric of a vector field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine distance (0.0 = identical direction).
    Cosine,
}

/// Storage layout of a vector field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorLayout {
    /// Brute-force scan over every indexed vector.
    Flat,
}

/// Type of an indexed field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Tokenized full-text field.
    Text,
    /// Numeric field (stored as a decimal string).
    Numeric,
    /// Packed `f32` vector field.
    Vector {
        /// Number of components per vector.
        dimension: usize,
        /// Distance metric used by KNN queries.
        metric: DistanceMetric,
        /// Index layout.
        layout: VectorLayout,
    },
}

/// One field of an index schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Hash field name.
    pub name: String,
    /// How the field is indexed.
    pub kind: FieldKind,
}

impl SchemaField {
    /// Creates a text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }

    /// Creates a numeric field.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
        }
    }

    /// Creates a flat cosine vector field.
    pub fn flat_cosine_vector(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Vector {
                dimension,
                metric: DistanceMetric::Cosine,
                layout: VectorLayout::Flat,
            },
        }
    }
}

/// A secondary index over hashes whose key starts with `prefix`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Hash-key prefix covered by the index.
    pub prefix: String,
    /// Indexed fields.
    pub schema: Vec<SchemaField>,
}

impl IndexDefinition {
    /// Returns the names of all text fields, in schema order.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.schema
            .iter()
            .filter(|f| f.kind == FieldKind::Text)
            .map(|f| f.name.as_str())
    }

    /// Returns the named field, if present.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.schema.iter().find(|f| f.name == name)
    }

    /// Returns true if `name` is a text or numeric field.
    ///
    /// Only these fields are returned with search hits; vectors never are.
    pub fn is_returnable(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|f| matches!(f.kind, FieldKind::Text | FieldKind::Numeric))
    }
}

/// Index metadata returned by `index_info`.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexInfo {
    /// The stored definition.
    pub definition: IndexDefinition,
    /// Number of hashes currently covered by the index.
    pub num_docs: usize,
}

/// One search result.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    /// Hash key of the matching document.
    pub key: String,
    /// Returnable (text and numeric) fields of the document.
    pub fields: HashFields,
    /// Vector distance for KNN queries; `None` for text queries.
    pub distance: Option<f32>,
}

impl SearchHit {
    /// Returns the named field as UTF-8 text, if present and valid.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}
