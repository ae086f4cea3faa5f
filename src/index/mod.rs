//! Index management for listing search.
//!
//! The secondary index is declared once and then maintained by the store:
//! every hash written under the index prefix is searchable immediately and
//! disappears from results when deleted. [`ensure_index`] is the only
//! operation the service performs on the index itself.
//!
//! # Schema
//!
//! | Field | Kind |
//! |-------|------|
//! | `title` | TEXT |
//! | `description` | TEXT |
//! | `price` | NUMERIC |
//! | `imageUrl` | TEXT |
//! | `vector` | VECTOR FLOAT32 × 1536, COSINE, FLAT |

pub(crate) mod eval;
pub mod types;

pub use types::{
    DistanceMetric, FieldKind, HashFields, IndexDefinition, IndexInfo, SchemaField, SearchHit,
    VectorLayout,
};

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{LodgingError, Result};
use crate::listing::fields;
use crate::storage::ListingStore;
use crate::vector::EMBEDDING_DIMENSION;

/// Builds the listing index definition for the given configuration.
pub fn lodging_index(config: &Config) -> IndexDefinition {
    IndexDefinition {
        name: config.index_name.clone(),
        prefix: config.key_prefix.clone(),
        schema: vec![
            SchemaField::text(fields::TITLE),
            SchemaField::text(fields::DESCRIPTION),
            SchemaField::numeric(fields::PRICE),
            SchemaField::text(fields::IMAGE_URL),
            SchemaField::flat_cosine_vector(fields::VECTOR, EMBEDDING_DIMENSION),
        ],
    }
}

/// Makes sure `definition` exists in the store.
///
/// Idempotent: an existing index is left untouched, whatever its schema.
/// Losing a creation race to another instance counts as success.
///
/// # Errors
///
/// Returns `LodgingError::Index` if the index is absent and cannot be
/// created. Callers must treat this as fatal: searching without the index
/// is not allowed to degrade silently.
#[instrument(skip(store, definition), fields(index = %definition.name))]
pub fn ensure_index(store: &dyn ListingStore, definition: &IndexDefinition) -> Result<()> {
    if let Some(info) = store.index_info(&definition.name)? {
        debug!(num_docs = info.num_docs, "Index already present");
        if info.definition != *definition {
            warn!("Existing index schema differs from the requested one; keeping it");
        }
        return Ok(());
    }

    match store.create_index(definition) {
        Ok(()) => {
            info!(prefix = %definition.prefix, "Index created");
            Ok(())
        }
        Err(LodgingError::Storage(err)) if err.is_index_exists() => {
            debug!("Index created concurrently by another instance");
            Ok(())
        }
        Err(err) => Err(LodgingError::index(format!(
            "cannot create index '{}': {}",
            definition.name, err
        ))),
    }
}
