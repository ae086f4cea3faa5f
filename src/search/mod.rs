//! Keyword and semantic search over listings.
//!
//! Two modes share the [`ListingSummary`] result shape:
//!
//! | Mode | Index query | Cached |
//! |------|-------------|--------|
//! | [`text_search`](QueryEngine::text_search) | full-text on TEXT fields | no |
//! | [`search_similar`](QueryEngine::search_similar) | KNN on `vector`, cosine | yes, `search:{lowercased query}` |
//!
//! A cached semantic result is returned as stored: it may show listings
//! that were deleted or changed within the cache TTL.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::embedding::EmbeddingCache;
use crate::error::Result;
use crate::listing::{fields, ListingSummary};
use crate::storage::ListingStore;
use crate::vector::pack_vector;

/// Returns the store key caching semantic results for `query`.
///
/// The key depends only on the lowercased query, not on `top_k`.
pub fn search_cache_key(query: &str) -> String {
    format!("search:{}", query.to_lowercase())
}

/// Runs search queries against the listing index.
pub struct QueryEngine {
    store: Arc<dyn ListingStore>,
    embeddings: Arc<EmbeddingCache>,
    index_name: String,
    key_prefix: String,
    cache_ttl: Duration,
}

impl QueryEngine {
    /// Creates an engine querying the index named in `config`.
    pub fn new(
        store: Arc<dyn ListingStore>,
        embeddings: Arc<EmbeddingCache>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            embeddings,
            index_name: config.index_name.clone(),
            key_prefix: config.key_prefix.clone(),
            cache_ttl: config.search_cache_ttl,
        }
    }

    /// Full-text search, in the index's relevance order.
    ///
    /// The query goes to the index literally; `*` lists every listing.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub fn text_search(&self, query: &str, limit: usize) -> Result<Vec<ListingSummary>> {
        let hits = self.store.search_text(&self.index_name, query, limit)?;
        debug!(hits = hits.len(), "Keyword search complete");
        Ok(hits
            .into_iter()
            .map(|hit| ListingSummary::from_hit(hit, &self.key_prefix))
            .collect())
    }

    /// Semantic search: the `top_k` listings closest to the query embedding.
    ///
    /// Results carry their cosine distance as `score`, ascending. A cached
    /// result for the same lowercased query is returned unchanged within
    /// the search cache TTL.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub fn search_similar(&self, query: &str, top_k: usize) -> Result<Vec<ListingSummary>> {
        let cache_key = search_cache_key(query);

        if let Some(cached) = self.store.get_expiring(&cache_key)? {
            match serde_json::from_slice::<Vec<ListingSummary>>(&cached) {
                Ok(results) => {
                    debug!(results = results.len(), "Search cache hit");
                    return Ok(results);
                }
                Err(err) => warn!(error = %err, "Discarding unreadable cached search result"),
            }
        }

        let vector = self.embeddings.embedding_for(query);
        let blob = pack_vector(&vector);
        let hits = self
            .store
            .search_knn(&self.index_name, fields::VECTOR, &blob, top_k)?;

        let results: Vec<ListingSummary> = hits
            .into_iter()
            .map(|hit| ListingSummary::from_hit(hit, &self.key_prefix))
            .collect();

        let payload = serde_json::to_vec(&results)?;
        self.store.set_expiring(&cache_key, &payload, self.cache_ttl)?;

        debug!(results = results.len(), "Search cache populated");
        Ok(results)
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("index_name", &self.index_name)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}
