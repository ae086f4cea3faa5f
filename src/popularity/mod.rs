//! View-count popularity ranking.
//!
//! Scores live in one ranked set (default `lodgings_popularity`) keyed by
//! listing key. Entries are created at 0 when a listing is created, bumped
//! by view events and dropped on delete.
//!
//! Deleting a listing and dropping its entry are two store calls; an entry
//! can outlive its listing. [`PopularityTracker::top_n`] skips such
//! orphans.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::Result;
use crate::listing::Listing;
use crate::storage::ListingStore;

/// Ranked listing popularity.
pub struct PopularityTracker {
    store: Arc<dyn ListingStore>,
    ranking_key: String,
    key_prefix: String,
}

impl PopularityTracker {
    /// Creates a tracker over the ranked set named in `config`.
    pub fn new(store: Arc<dyn ListingStore>, config: &Config) -> Self {
        Self {
            store,
            ranking_key: config.popularity_key.clone(),
            key_prefix: config.key_prefix.clone(),
        }
    }

    /// Adds one view. Returns the new score.
    ///
    /// A listing without an entry starts at 0, so its first view scores 1.
    #[instrument(skip(self))]
    pub fn increment(&self, listing_key: &str) -> Result<f64> {
        let score = self.store.rank_increment(&self.ranking_key, listing_key, 1.0)?;
        debug!(score, "Popularity incremented");
        Ok(score)
    }

    /// Sets the entry to 0.
    pub fn initialize(&self, listing_key: &str) -> Result<()> {
        self.store.rank_set(&self.ranking_key, listing_key, 0.0)
    }

    /// Drops the entry. Returns `true` if one existed.
    pub fn remove(&self, listing_key: &str) -> Result<bool> {
        self.store.rank_remove(&self.ranking_key, listing_key)
    }

    /// Returns the current score, if the listing has an entry.
    pub fn score(&self, listing_key: &str) -> Result<Option<f64>> {
        self.store.rank_score(&self.ranking_key, listing_key)
    }

    /// Returns the raw ranking: up to `limit` `(listing key, score)` pairs,
    /// highest first.
    pub fn top_keys(&self, limit: usize) -> Result<Vec<(String, f64)>> {
        self.store.rank_top(&self.ranking_key, limit)
    }

    /// Returns up to `limit` of the most viewed listings, highest first.
    ///
    /// Each ranked key is re-read from the store; keys whose listing no
    /// longer exists or no longer decodes are skipped, so fewer than
    /// `limit` may come back.
    #[instrument(skip(self))]
    pub fn top_n(&self, limit: usize) -> Result<Vec<(Listing, f64)>> {
        let mut top = Vec::with_capacity(limit.min(64));
        for (key, score) in self.top_keys(limit)? {
            let Some(hash) = self.store.hash_get_all(&key)? else {
                debug!(key = %key, "Skipping ranked key without listing");
                continue;
            };
            let id = key.strip_prefix(self.key_prefix.as_str()).unwrap_or(&key);
            match Listing::from_hash(id, &hash) {
                Ok(listing) => top.push((listing, score)),
                Err(err) => warn!(key = %key, error = %err, "Skipping undecodable listing"),
            }
        }
        Ok(top)
    }
}

impl std::fmt::Debug for PopularityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopularityTracker")
            .field("ranking_key", &self.ranking_key)
            .finish_non_exhaustive()
    }
}
