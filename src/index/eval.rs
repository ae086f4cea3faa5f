//! Query evaluation for secondary indexes.
//!
//! Stores call into this module with the documents currently covered by
//! an index (every hash under the index prefix, in key order). Evaluating
//! against live documents is what makes index membership follow writes:
//! there is no separate population step to forget.
//!
//! # Text matching
//!
//! ```text
//! query "Paris loft"  →  terms ["paris", "loft"]
//! doc matches        ⇔  every term occurs in some TEXT field
//! relevance          =  total occurrences of all terms
//! order              =  relevance desc, then key order
//! ```
//!
//! # KNN
//!
//! Flat scan: the distance from the query to every decodable vector,
//! sorted ascending with a stable sort, truncated to `k`.

use std::collections::HashSet;

use crate::error::{Result, StorageError};
use crate::vector::{cosine_distance, unpack_vector};

use super::types::{FieldKind, HashFields, IndexDefinition, SearchHit};

/// Largest vector dimension an index accepts.
pub const MAX_VECTOR_DIMENSION: usize = 32_768;

/// Query string matching every document.
pub const MATCH_ALL: &str = "*";

/// Checks that a definition is well formed before it is stored.
pub(crate) fn validate_definition(definition: &IndexDefinition) -> Result<()> {
    if definition.name.trim().is_empty() {
        return Err(StorageError::invalid_index("index name must not be empty").into());
    }
    if definition.prefix.is_empty() {
        return Err(StorageError::invalid_index("key prefix must not be empty").into());
    }
    if definition.schema.is_empty() {
        return Err(StorageError::invalid_index("schema must declare at least one field").into());
    }

    let mut seen = HashSet::new();
    for field in &definition.schema {
        if field.name.is_empty() {
            return Err(StorageError::invalid_index("field name must not be empty").into());
        }
        if !seen.insert(field.name.as_str()) {
            return Err(
                StorageError::invalid_index(format!("duplicate field '{}'", field.name)).into(),
            );
        }
        if let FieldKind::Vector { dimension, .. } = field.kind {
            if dimension == 0 || dimension > MAX_VECTOR_DIMENSION {
                return Err(StorageError::invalid_index(format!(
                    "vector field '{}' dimension must be between 1 and {}, got {}",
                    field.name, MAX_VECTOR_DIMENSION, dimension
                ))
                .into());
            }
        }
    }

    Ok(())
}

/// Splits text into lowercase alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Runs a full-text query over `docs`.
pub(crate) fn match_text<I>(
    definition: &IndexDefinition,
    docs: I,
    query: &str,
    limit: usize,
) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (String, HashFields)>,
{
    if limit == 0 {
        return Vec::new();
    }

    if query.trim() == MATCH_ALL {
        return docs
            .into_iter()
            .take(limit)
            .map(|(key, fields)| to_hit(definition, key, fields, None))
            .collect();
    }

    let terms = tokenize(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let text_fields: Vec<&str> = definition.text_fields().collect();
    let mut scored: Vec<(usize, SearchHit)> = Vec::new();

    for (key, fields) in docs {
        let doc_terms: Vec<String> = text_fields
            .iter()
            .filter_map(|name| fields.get(*name))
            .filter_map(|bytes| std::str::from_utf8(bytes).ok())
            .flat_map(tokenize)
            .collect();

        let mut relevance = 0;
        let mut all_present = true;
        for term in &terms {
            let count = doc_terms.iter().filter(|t| *t == term).count();
            if count == 0 {
                all_present = false;
                break;
            }
            relevance += count;
        }

        if all_present {
            scored.push((relevance, to_hit(definition, key, fields, None)));
        }
    }

    // Stable: equal relevance keeps key order
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, hit)| hit).collect()
}

/// Runs a K-nearest-neighbor query against the vector field `field`.
///
/// Documents without a decodable vector of the right dimension are not
/// part of the vector index and are skipped.
///
/// # Errors
///
/// Returns `StorageError::InvalidQuery` if `field` is not a vector field of
/// the index or the query blob has the wrong length.
pub(crate) fn knn<I>(
    definition: &IndexDefinition,
    docs: I,
    field: &str,
    query_blob: &[u8],
    k: usize,
) -> Result<Vec<SearchHit>>
where
    I: IntoIterator<Item = (String, HashFields)>,
{
    let dimension = match definition.field(field).map(|f| &f.kind) {
        Some(FieldKind::Vector { dimension, .. }) => *dimension,
        _ => {
            return Err(StorageError::invalid_query(format!(
                "'{}' is not a vector field of index '{}'",
                field, definition.name
            ))
            .into())
        }
    };

    let expected_len = dimension * 4;
    if query_blob.len() != expected_len {
        return Err(StorageError::invalid_query(format!(
            "query vector blob must be {} bytes, got {}",
            expected_len,
            query_blob.len()
        ))
        .into());
    }
    let query = unpack_vector(query_blob)?;

    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(f32, String, HashFields)> = Vec::new();
    for (key, fields) in docs {
        let vector = match fields.get(field) {
            Some(blob) if blob.len() == expected_len => unpack_vector(blob)?,
            _ => continue,
        };
        let distance = cosine_distance(&query, &vector);
        scored.push((distance, key, fields));
    }

    // Stable: equal distances keep key order
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(distance, key, fields)| to_hit(definition, key, fields, Some(distance)))
        .collect())
}

fn to_hit(
    definition: &IndexDefinition,
    key: String,
    fields: HashFields,
    distance: Option<f32>,
) -> SearchHit {
    let fields = fields
        .into_iter()
        .filter(|(name, _)| definition.is_returnable(name))
        .collect();
    SearchHit {
        key,
        fields,
        distance,
    }
}
