//! Create, update and delete with side effects.
//!
//! # Pipeline
//!
//! ```text
//! create:  validate → duplicate check → embed → insert if absent ★ → popularity 0 → fan out "created"
//! update:  empty? → exists? → validate → merge if present ★ → re-read → fan out "updated"
//! delete:  read → hash_delete ★ → popularity remove → fan out "deleted"
//! ```
//!
//! ★ is the commit point. Everything after it is best effort: failures are
//! logged and never undo or fail the committed write.
//!
//! The duplicate and existence checks before ★ only short-circuit early;
//! ★ itself re-checks inside its write transaction, so a concurrent create
//! or delete between the two can neither overwrite a listing nor leave a
//! partial one behind.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::embedding::EmbeddingCache;
use crate::error::{Result, ValidationError};
use crate::listing::validation::{validate_listing_update, validate_new_listing};
use crate::listing::{fields, Listing, ListingUpdate, NewListing, UpdateOutcome};
use crate::notify::{EventAction, FanOut, ListingSnapshot};
use crate::popularity::PopularityTracker;
use crate::storage::ListingStore;

/// Write path for listings.
pub struct MutationPipeline {
    store: Arc<dyn ListingStore>,
    embeddings: Arc<EmbeddingCache>,
    popularity: Arc<PopularityTracker>,
    fan_out: FanOut,
    key_prefix: String,
    default_image_url: String,
}

impl MutationPipeline {
    /// Creates a pipeline.
    pub fn new(
        store: Arc<dyn ListingStore>,
        embeddings: Arc<EmbeddingCache>,
        popularity: Arc<PopularityTracker>,
        fan_out: FanOut,
        config: &Config,
    ) -> Self {
        Self {
            store,
            embeddings,
            popularity,
            fan_out,
            key_prefix: config.key_prefix.clone(),
            default_image_url: config.default_image_url.clone(),
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Stores a new listing and announces it.
    ///
    /// # Errors
    ///
    /// - `LodgingError::Validation` for invalid fields or an id already in
    ///   use; nothing is written
    /// - `LodgingError::Storage` if the hash write fails
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub fn create(&self, input: NewListing) -> Result<Listing> {
        validate_new_listing(&input)?;

        let key = self.key(input.id.as_str());
        if self.store.hash_exists(&key)? {
            return Err(ValidationError::duplicate_id(&input.id).into());
        }

        let listing = Listing {
            id: input.id,
            title: input.title,
            description: input.description,
            price: input.price,
            image_url: input
                .image_url
                .unwrap_or_else(|| self.default_image_url.clone()),
        };

        let vector = self.embeddings.embedding_for(&listing.embedding_text());
        if !self.store.hash_insert_new(&key, &listing.to_hash(&vector))? {
            return Err(ValidationError::duplicate_id(&listing.id).into());
        }

        if let Err(err) = self.popularity.initialize(&key) {
            warn!(error = %err, "Failed to initialize popularity entry");
        }

        self.fan_out
            .broadcast(EventAction::Created, ListingSnapshot::from(&listing));
        info!("Listing created");
        Ok(listing)
    }

    /// Merges the supplied fields into an existing listing.
    ///
    /// The stored embedding is kept as is, even when title or description
    /// change.
    ///
    /// # Errors
    ///
    /// - `LodgingError::Validation` for invalid supplied fields
    /// - `LodgingError::Storage` if a store call fails
    #[instrument(skip(self, update))]
    pub fn update(&self, id: &str, update: ListingUpdate) -> Result<UpdateOutcome> {
        if update.is_empty() {
            return Ok(UpdateOutcome::NoChanges);
        }

        let key = self.key(id);
        if !self.store.hash_exists(&key)? {
            return Ok(UpdateOutcome::NotFound);
        }

        validate_listing_update(&update)?;
        if !self.store.hash_update_existing(&key, &update.to_hash())? {
            return Ok(UpdateOutcome::NotFound);
        }

        let Some(hash) = self.store.hash_get_all(&key)? else {
            // Deleted between the write and the re-read
            return Ok(UpdateOutcome::NotFound);
        };
        let listing = Listing::from_hash(id, &hash)?;

        self.fan_out
            .broadcast(EventAction::Updated, ListingSnapshot::from(&listing));
        info!("Listing updated");
        Ok(UpdateOutcome::Updated(listing))
    }

    /// Deletes a listing and its popularity entry.
    ///
    /// Returns `false` if no listing has this id.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Storage` if reading or deleting the hash fails.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<bool> {
        let key = self.key(id);
        let Some(hash) = self.store.hash_get_all(&key)? else {
            return Ok(false);
        };
        let snapshot = last_known(id, &hash);

        if !self.store.hash_delete(&key)? {
            return Ok(false);
        }

        if let Err(err) = self.popularity.remove(&key) {
            warn!(error = %err, "Failed to remove popularity entry");
        }

        self.fan_out.broadcast(EventAction::Deleted, snapshot);
        info!("Listing deleted");
        Ok(true)
    }
}

/// Snapshot of a listing about to be deleted.
///
/// Falls back to the raw text fields when the hash no longer parses as a
/// listing; the id is always present.
fn last_known(id: &str, hash: &crate::index::HashFields) -> ListingSnapshot {
    if let Ok(listing) = Listing::from_hash(id, hash) {
        return ListingSnapshot::from(&listing);
    }
    let text = |name: &str| {
        hash.get(name)
            .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    };
    ListingSnapshot {
        title: text(fields::TITLE),
        description: text(fields::DESCRIPTION),
        image_url: text(fields::IMAGE_URL),
        ..ListingSnapshot::id_only(id)
    }
}

impl std::fmt::Debug for MutationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPipeline")
            .field("key_prefix", &self.key_prefix)
            .field("fan_out", &self.fan_out)
            .finish_non_exhaustive()
    }
}
