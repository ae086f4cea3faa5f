//! The [`LodgingService`] handle and its builder.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lodgings::{Config, LodgingService, NewListing};
//!
//! let service = LodgingService::open("./lodgings.db", Config::default())?;
//!
//! service.create_listing(NewListing::new("1", "Paris loft", "Near the Seine", 120.0))?;
//! let hits = service.search_similar("paris", 5)?;
//! service.record_view("1")?;
//! ```
//!
//! # Thread Safety
//!
//! `LodgingService` is `Send + Sync`. Share one instance behind an `Arc`;
//! every operation is a short sequence of blocking store calls.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::embedding::{create_embedding_service, EmbeddingCache, EmbeddingService};
use crate::error::{LodgingError, Result};
use crate::index::{ensure_index, lodging_index};
use crate::listing::{Listing, ListingSummary, ListingUpdate, NewListing, UpdateOutcome};
use crate::mutation::MutationPipeline;
use crate::notify::{ChannelBridge, FanOut, NotificationSink, SocketBridge};
use crate::popularity::PopularityTracker;
use crate::search::QueryEngine;
use crate::storage::{ListingStore, RedbStore, StreamEntry};
use crate::types::Embedding;
use crate::vector::EMBEDDING_DIMENSION;

/// Number of event-log entries and popular listings in [`CatalogStats`].
pub const STATS_SAMPLE_SIZE: usize = 5;

/// Dashboard summary of the catalog.
#[derive(Clone, Debug)]
pub struct CatalogStats {
    /// Number of stored listings.
    pub total_listings: usize,
    /// Number of entries currently kept in the event log.
    pub event_log_len: usize,
    /// Most recent event-log entries, newest first.
    pub recent_events: Vec<StreamEntry>,
    /// Most viewed listings with their scores, highest first.
    pub top_popular: Vec<(Listing, f64)>,
}

/// Hybrid search and notification service for lodging listings.
///
/// Build one with [`LodgingService::open`], [`LodgingService::new`] or
/// [`LodgingService::builder`]. Construction makes sure the listing index
/// exists and fails if it cannot be created.
pub struct LodgingService {
    store: Arc<dyn ListingStore>,
    embeddings: Arc<EmbeddingCache>,
    query: QueryEngine,
    popularity: Arc<PopularityTracker>,
    mutations: MutationPipeline,
    config: Config,
}

impl LodgingService {
    /// Opens (or creates) a redb file at `path` and builds a service on it.
    ///
    /// No live-socket clients are attached; use [`builder`](Self::builder)
    /// with [`LodgingServiceBuilder::socket_bridge`] to wire one in.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - The database file is locked, corrupted or of another schema version
    /// - The listing index cannot be created
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let store = Arc::new(RedbStore::open(path, &config)?);
        Self::builder(store, config).build()
    }

    /// Builds a service over an existing store, broadcasting live events
    /// through `bridge`.
    ///
    /// # Errors
    ///
    /// See [`LodgingServiceBuilder::build`].
    pub fn new(
        store: Arc<dyn ListingStore>,
        bridge: Arc<dyn SocketBridge>,
        config: Config,
    ) -> Result<Self> {
        Self::builder(store, config).socket_bridge(bridge).build()
    }

    /// Starts a builder for finer control over the embedding provider and
    /// notification sinks.
    pub fn builder(store: Arc<dyn ListingStore>, config: Config) -> LodgingServiceBuilder {
        LodgingServiceBuilder {
            store,
            config,
            bridge: None,
            embedding: None,
            sinks: None,
        }
    }

    /// Returns the configuration this service was built with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the shared store handle.
    #[inline]
    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// Returns true if embeddings come from the mock generator.
    pub fn is_mock_embedding(&self) -> bool {
        self.embeddings.is_mock()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Validates and stores a new listing, then announces it.
    ///
    /// # Errors
    ///
    /// - `LodgingError::Validation` for a blank id or title, a negative or
    ///   non-finite price, or an id already in use
    /// - `LodgingError::Storage` if the write fails
    pub fn create_listing(&self, listing: NewListing) -> Result<Listing> {
        self.mutations.create(listing)
    }

    /// Merges `update` into the listing with this id.
    ///
    /// # Errors
    ///
    /// - `LodgingError::Validation` for invalid supplied fields
    /// - `LodgingError::Storage` if a store call fails
    pub fn update_listing(&self, id: &str, update: ListingUpdate) -> Result<UpdateOutcome> {
        self.mutations.update(id, update)
    }

    /// Deletes the listing with this id. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Storage` if a store call fails.
    pub fn delete_listing(&self, id: &str) -> Result<bool> {
        self.mutations.delete(id)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the listing with this id, if stored.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Storage` if the read fails or the stored
    /// record cannot be decoded.
    #[instrument(skip(self))]
    pub fn find_listing(&self, id: &str) -> Result<Option<Listing>> {
        let key = self.config.listing_key(id);
        match self.store.hash_get_all(&key)? {
            Some(hash) => Ok(Some(Listing::from_hash(id, &hash)?)),
            None => Ok(None),
        }
    }

    /// Returns every stored listing, in key order.
    ///
    /// Listings deleted between the key scan and the read are skipped, as
    /// are records that no longer decode as a listing.
    #[instrument(skip(self))]
    pub fn list_listings(&self) -> Result<Vec<Listing>> {
        let keys = self.store.hash_keys(&self.config.key_prefix)?;
        let mut listings = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(id) = self.config.listing_id_from_key(&key) else {
                continue;
            };
            let Some(hash) = self.store.hash_get_all(&key)? else {
                continue;
            };
            match Listing::from_hash(id, &hash) {
                Ok(listing) => listings.push(listing),
                Err(err) => warn!(key = %key, error = %err, "Skipping undecodable listing"),
            }
        }
        debug!(count = listings.len(), "Listed listings");
        Ok(listings)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Keyword search over title, description and image URL.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Storage` if the index query fails.
    pub fn text_search(&self, query: &str, limit: usize) -> Result<Vec<ListingSummary>> {
        self.query.text_search(query, limit)
    }

    /// Semantic search, cached per lowercased query.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Storage` if the index query or cache write
    /// fails.
    pub fn search_similar(&self, query: &str, top_k: usize) -> Result<Vec<ListingSummary>> {
        self.query.search_similar(query, top_k)
    }

    /// Embedding used for `text`. Never fails; see
    /// [`EmbeddingCache::embedding_for`].
    pub fn embedding_for(&self, text: &str) -> Embedding {
        self.embeddings.embedding_for(text)
    }

    // =========================================================================
    // Popularity
    // =========================================================================

    /// Records one view of the listing. Returns its new score.
    ///
    /// The listing itself is not checked; unknown ids get an entry that
    /// [`top_popular`](Self::top_popular) later skips.
    pub fn record_view(&self, id: &str) -> Result<f64> {
        self.popularity.increment(&self.config.listing_key(id))
    }

    /// Returns up to `limit` of the most viewed listings, highest first.
    pub fn top_popular(&self, limit: usize) -> Result<Vec<(Listing, f64)>> {
        self.popularity.top_n(limit)
    }

    /// Returns the popularity score of the listing, if it has an entry.
    pub fn popularity_score(&self, id: &str) -> Result<Option<f64>> {
        self.popularity.score(&self.config.listing_key(id))
    }

    // =========================================================================
    // Event log
    // =========================================================================

    /// Returns up to `count` event-log entries, newest first.
    pub fn recent_events(&self, count: usize) -> Result<Vec<StreamEntry>> {
        self.store.stream_recent(&self.config.stream_key, count)
    }

    /// Collects dashboard figures.
    ///
    /// The figures come from separate reads and may reflect slightly
    /// different moments under concurrent writes.
    #[instrument(skip(self))]
    pub fn catalog_stats(&self) -> Result<CatalogStats> {
        let total_listings = self.store.hash_keys(&self.config.key_prefix)?.len();
        let event_log_len = self.store.stream_len(&self.config.stream_key)?;
        let recent_events = self.recent_events(STATS_SAMPLE_SIZE)?;
        let top_popular = self.top_popular(STATS_SAMPLE_SIZE)?;

        Ok(CatalogStats {
            total_listings,
            event_log_len,
            recent_events,
            top_popular,
        })
    }
}

impl std::fmt::Debug for LodgingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodgingService")
            .field("config", &self.config)
            .field("mutations", &self.mutations)
            .finish_non_exhaustive()
    }
}

/// Builder for [`LodgingService`].
///
/// Unset parts fall back to the configuration: the embedding provider comes
/// from [`Config::embedding_provider`], the sinks are the standard event
/// log, pub/sub and socket trio, and the socket bridge is an in-process
/// [`ChannelBridge`] with no clients.
pub struct LodgingServiceBuilder {
    store: Arc<dyn ListingStore>,
    config: Config,
    bridge: Option<Arc<dyn SocketBridge>>,
    embedding: Option<Box<dyn EmbeddingService>>,
    sinks: Option<Vec<Box<dyn NotificationSink>>>,
}

impl LodgingServiceBuilder {
    /// Live-socket bridge used by the standard socket sink.
    pub fn socket_bridge(mut self, bridge: Arc<dyn SocketBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Uses `service` instead of the provider named in the configuration.
    pub fn embedding_service(mut self, service: Box<dyn EmbeddingService>) -> Self {
        self.embedding = Some(service);
        self
    }

    /// Replaces the standard sinks. The socket bridge is then unused.
    pub fn sinks(mut self, sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        self.sinks = Some(sinks);
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    ///
    /// - `LodgingError::Validation` if the configuration is invalid
    /// - `LodgingError::Config` if the configured embedding provider is not
    ///   available in this build, or produces vectors of another dimension
    /// - `LodgingError::Index` if the listing index is missing and cannot be
    ///   created
    #[instrument(skip(self), fields(index = %self.config.index_name))]
    pub fn build(self) -> Result<LodgingService> {
        let Self {
            store,
            config,
            bridge,
            embedding,
            sinks,
        } = self;

        config.validate()?;

        let provider = match embedding {
            Some(service) => Some(service),
            None => create_embedding_service(&config)?,
        };
        if let Some(provider) = &provider {
            if provider.dimension() != EMBEDDING_DIMENSION {
                return Err(LodgingError::config(format!(
                    "embedding provider produces {} dimensions, the index expects {}",
                    provider.dimension(),
                    EMBEDDING_DIMENSION
                )));
            }
        }

        ensure_index(store.as_ref(), &lodging_index(&config))?;

        let embeddings = Arc::new(EmbeddingCache::new(
            store.clone(),
            provider,
            config.embedding_cache_ttl,
        ));
        let query = QueryEngine::new(store.clone(), embeddings.clone(), &config);
        let popularity = Arc::new(PopularityTracker::new(store.clone(), &config));
        let fan_out = match sinks {
            Some(sinks) => FanOut::new(sinks),
            None => {
                let bridge = bridge.unwrap_or_else(|| {
                    Arc::new(ChannelBridge::with_capacity(config.subscriber_capacity))
                });
                FanOut::standard(store.clone(), bridge, &config)
            }
        };
        let mutations = MutationPipeline::new(
            store.clone(),
            embeddings.clone(),
            popularity.clone(),
            fan_out,
            &config,
        );

        info!(
            mock_embedding = embeddings.is_mock(),
            "Lodging service ready"
        );

        Ok(LodgingService {
            store,
            embeddings,
            query,
            popularity,
            mutations,
            config,
        })
    }
}

impl std::fmt::Debug for LodgingServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodgingServiceBuilder")
            .field("config", &self.config)
            .field("custom_embedding", &self.embedding.is_some())
            .field("custom_sinks", &self.sinks.is_some())
            .finish_non_exhaustive()
    }
}
