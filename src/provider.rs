//! Async facade for use from async request handlers.
//!
//! [`LodgingService`] is blocking: every operation is a handful of redb
//! transactions and, with a remote embedding provider, an HTTP call.
//! [`AsyncLodgingService`] moves each call onto tokio's blocking pool so
//! async callers never stall a runtime worker.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lodgings::{AsyncLodgingService, LodgingProvider, LodgingService};
//!
//! let provider = AsyncLodgingService::new(Arc::new(service));
//! let hits = provider.search_similar("paris".into(), 5).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{LodgingError, Result};
use crate::listing::{Listing, ListingSummary, ListingUpdate, NewListing, UpdateOutcome};
use crate::service::{CatalogStats, LodgingService};

/// Object-safe async view of the lodging operations.
#[async_trait]
pub trait LodgingProvider: Send + Sync {
    /// See [`LodgingService::create_listing`].
    async fn create_listing(&self, listing: NewListing) -> Result<Listing>;

    /// See [`LodgingService::update_listing`].
    async fn update_listing(&self, id: String, update: ListingUpdate) -> Result<UpdateOutcome>;

    /// See [`LodgingService::delete_listing`].
    async fn delete_listing(&self, id: String) -> Result<bool>;

    /// See [`LodgingService::find_listing`].
    async fn find_listing(&self, id: String) -> Result<Option<Listing>>;

    /// See [`LodgingService::text_search`].
    async fn text_search(&self, query: String, limit: usize) -> Result<Vec<ListingSummary>>;

    /// See [`LodgingService::search_similar`].
    async fn search_similar(&self, query: String, top_k: usize) -> Result<Vec<ListingSummary>>;

    /// See [`LodgingService::record_view`].
    async fn record_view(&self, id: String) -> Result<f64>;

    /// See [`LodgingService::top_popular`].
    async fn top_popular(&self, limit: usize) -> Result<Vec<(Listing, f64)>>;

    /// See [`LodgingService::catalog_stats`].
    async fn catalog_stats(&self) -> Result<CatalogStats>;
}

/// [`LodgingProvider`] running a shared [`LodgingService`] on
/// `tokio::task::spawn_blocking`.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Debug)]
pub struct AsyncLodgingService {
    inner: Arc<LodgingService>,
}

impl AsyncLodgingService {
    /// Wraps a shared service.
    pub fn new(inner: Arc<LodgingService>) -> Self {
        Self { inner }
    }

    /// Returns the wrapped service for direct blocking use.
    pub fn inner(&self) -> &Arc<LodgingService> {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LodgingService) -> Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|err| LodgingError::task(format!("blocking task failed: {err}")))?
    }
}

#[async_trait]
impl LodgingProvider for AsyncLodgingService {
    async fn create_listing(&self, listing: NewListing) -> Result<Listing> {
        self.run(move |s| s.create_listing(listing)).await
    }

    async fn update_listing(&self, id: String, update: ListingUpdate) -> Result<UpdateOutcome> {
        self.run(move |s| s.update_listing(&id, update)).await
    }

    async fn delete_listing(&self, id: String) -> Result<bool> {
        self.run(move |s| s.delete_listing(&id)).await
    }

    async fn find_listing(&self, id: String) -> Result<Option<Listing>> {
        self.run(move |s| s.find_listing(&id)).await
    }

    async fn text_search(&self, query: String, limit: usize) -> Result<Vec<ListingSummary>> {
        self.run(move |s| s.text_search(&query, limit)).await
    }

    async fn search_similar(&self, query: String, top_k: usize) -> Result<Vec<ListingSummary>> {
        self.run(move |s| s.search_similar(&query, top_k)).await
    }

    async fn record_view(&self, id: String) -> Result<f64> {
        self.run(move |s| s.record_view(&id)).await
    }

    async fn top_popular(&self, limit: usize) -> Result<Vec<(Listing, f64)>> {
        self.run(move |s| s.top_popular(limit)).await
    }

    async fn catalog_stats(&self) -> Result<CatalogStats> {
        self.run(|s| s.catalog_stats()).await
    }
}
