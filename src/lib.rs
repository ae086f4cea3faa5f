//! # lodgings
//!
//! Hybrid keyword/vector search, popularity ranking and change fan-out for
//! a catalog of lodging listings.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lodgings::{Config, LodgingService, NewListing};
//!
//! // Open or create a store; the search index is created on first use
//! let service = LodgingService::open("./lodgings.db", Config::default())?;
//!
//! // Create a listing: validated, embedded, indexed and announced
//! service.create_listing(
//!     NewListing::new("42", "Paris loft", "Sunny flat near the Seine", 140.0),
//! )?;
//!
//! // Keyword and semantic search
//! let by_word = service.text_search("loft", 10)?;
//! let similar = service.search_similar("paris", 5)?;
//!
//! // Popularity
//! service.record_view("42")?;
//! let top = service.top_popular(5)?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Listing store
//!
//! All state lives behind [`ListingStore`]: hashes for listings, a ranked
//! set for popularity, a bounded stream for the event log, expiring values
//! for caches, pub/sub, and a secondary index that follows hash writes.
//! [`RedbStore`] is the embedded implementation.
//!
//! ### Embeddings
//!
//! Listings and queries are embedded into 1536-dimension vectors. Without a
//! provider (the default) a deterministic mock vector is used; with the
//! `openai` feature an OpenAI-compatible endpoint is called and results are
//! cached. Provider failures always fall back to the mock vector.
//!
//! ### Change events
//!
//! Every create, update and delete is fanned out to the event log, the
//! pub/sub channel and live-socket clients. A failing sink never fails the
//! mutation.
//!
//! ## Features
//!
//! - `openai` - Enable the OpenAI embeddings client (`ureq`)
//!
//! ## Thread Safety
//!
//! [`LodgingService`] is `Send + Sync` and meant to be shared behind an
//! `Arc`. For async handlers wrap it in [`AsyncLodgingService`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod error;
mod mutation;
mod provider;
mod service;
mod types;

pub mod embedding;
pub mod index;
pub mod listing;
pub mod notify;
pub mod popularity;
pub mod search;
pub mod storage;

/// Fixed-dimension vector encoding and cosine distance.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main service interface
pub use service::{CatalogStats, LodgingService, LodgingServiceBuilder, STATS_SAMPLE_SIZE};

// Async adapter
pub use provider::{AsyncLodgingService, LodgingProvider};

// Configuration
pub use config::{
    Config, EmbeddingProvider, SyncMode, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};

// Error handling
pub use error::{LodgingError, Result, StorageError, ValidationError};

// Core types
pub use types::{Embedding, ListingId, Timestamp};

// Domain types
pub use listing::{Listing, ListingSummary, ListingUpdate, NewListing, UpdateOutcome};

// Notifications
pub use notify::{
    ChannelBridge, Event, EventAction, FanOutReport, ListingSnapshot, NotificationSink,
    SocketBridge,
};

// Storage
pub use storage::{ListingStore, RedbStore, StreamEntry, StreamEntryId};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common usage.
///
/// ```rust
/// use lodgings::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, SyncMode};
    pub use crate::error::{LodgingError, Result};
    pub use crate::listing::{Listing, ListingSummary, ListingUpdate, NewListing, UpdateOutcome};
    pub use crate::service::LodgingService;
    pub use crate::storage::{ListingStore, RedbStore};
    pub use crate::types::ListingId;
}
