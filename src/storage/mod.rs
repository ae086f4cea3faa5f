//! Store protocol and its embedded implementation.
//!
//! The service never talks to a database directly; it talks to the
//! [`ListingStore`] protocol, a key-value store with hash, ranked-set,
//! stream, expiring-value, pub/sub and secondary-index primitives. The
//! store handle is created by the process bootstrap and injected into each
//! component as `Arc<dyn ListingStore>`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        LodgingService / QueryEngine / PopularityTracker      │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                         │
//! │              │    ListingStore     │  ← Trait                │
//! │              └─────────────────────┘                         │
//! │                         ▲                                    │
//! │                 ┌───────┴───────┐                            │
//! │                 │   RedbStore   │  (redb + in-process pubsub)│
//! │                 └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Index follows writes
//!
//! Index queries are evaluated over the hashes that exist under the index
//! prefix at query time. Writing or deleting a hash is therefore all it
//! takes to add it to, update it in, or remove it from every index.

mod pubsub;
pub mod redb;
pub mod schema;

pub use self::redb::RedbStore;
pub use schema::{DatabaseMetadata, SCHEMA_VERSION};

use std::fmt;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::error::Result;
use crate::index::{HashFields, IndexDefinition, IndexInfo, SearchHit};
use crate::types::Timestamp;

/// Identifier of a stream entry: append time plus per-stream sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamEntryId {
    /// When the entry was appended.
    pub timestamp: Timestamp,
    /// Monotonic sequence within the stream.
    pub seq: u64,
}

impl fmt::Display for StreamEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp, self.seq)
    }
}

/// One entry of an append-only stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEntry {
    /// Entry identifier.
    pub id: StreamEntryId,
    /// Flat string fields, in append order.
    pub fields: Vec<(String, String)>,
}

impl StreamEntry {
    /// Returns the value of the first field named `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Key-value store protocol consumed by the service.
///
/// Every method is atomic on its own; no method spans another. Callers
/// needing several steps (e.g. delete a hash, then its ranking entry)
/// accept that a crash between them can leave the second step undone.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one handle is shared by all
/// concurrent callers.
pub trait ListingStore: Send + Sync {
    // =========================================================================
    // Hashes
    // =========================================================================

    /// Merges `fields` into the hash at `key`, creating it if absent.
    fn hash_set(&self, key: &str, fields: &HashFields) -> Result<()>;

    /// Writes `fields` as a new hash at `key` unless one already exists.
    ///
    /// Returns `false`, writing nothing, if `key` is taken.
    fn hash_insert_new(&self, key: &str, fields: &HashFields) -> Result<bool>;

    /// Merges `fields` into the hash at `key` only if it exists.
    ///
    /// Returns `false`, writing nothing, if `key` is absent.
    fn hash_update_existing(&self, key: &str, fields: &HashFields) -> Result<bool>;

    /// Returns every field of the hash at `key`, or `None` if absent.
    fn hash_get_all(&self, key: &str) -> Result<Option<HashFields>>;

    /// Deletes the hash at `key`. Returns `true` if it existed.
    fn hash_delete(&self, key: &str) -> Result<bool>;

    /// Returns true if a hash exists at `key`.
    fn hash_exists(&self, key: &str) -> Result<bool> {
        Ok(self.hash_get_all(key)?.is_some())
    }

    /// Returns every hash key starting with `prefix`, in key order.
    fn hash_keys(&self, prefix: &str) -> Result<Vec<String>>;

    // =========================================================================
    // Ranked sets
    // =========================================================================

    /// Sets `member`'s score in the set at `key`, adding it if absent.
    fn rank_set(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Adds `delta` to `member`'s score (absent members start at 0) and
    /// returns the new score.
    fn rank_increment(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Removes `member`. Returns `true` if it was present.
    fn rank_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// Returns `member`'s score, if present.
    fn rank_score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Returns up to `limit` members with the highest scores, descending.
    ///
    /// Equal scores are ordered by member, descending.
    fn rank_top(&self, key: &str, limit: usize) -> Result<Vec<(String, f64)>>;

    /// Returns the number of members in the set.
    fn rank_len(&self, key: &str) -> Result<usize>;

    // =========================================================================
    // Streams
    // =========================================================================

    /// Appends an entry and returns its id.
    fn stream_append(&self, key: &str, fields: &[(String, String)]) -> Result<StreamEntryId>;

    /// Drops the oldest entries so at most `max_len` remain. Returns the
    /// number removed.
    fn stream_trim(&self, key: &str, max_len: usize) -> Result<usize>;

    /// Returns the number of entries in the stream.
    fn stream_len(&self, key: &str) -> Result<usize>;

    /// Returns up to `count` entries, newest first.
    fn stream_recent(&self, key: &str, count: usize) -> Result<Vec<StreamEntry>>;

    // =========================================================================
    // Expiring values
    // =========================================================================

    /// Returns the value at `key` unless absent or expired.
    fn get_expiring(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` at `key` for `ttl`, replacing any previous value.
    fn set_expiring(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    // =========================================================================
    // Pub/sub
    // =========================================================================

    /// Publishes `message` on `channel`. Returns the number of subscribers
    /// that received it.
    fn publish(&self, channel: &str, message: &str) -> Result<usize>;

    /// Subscribes to `channel`. The subscription ends when the receiver is
    /// dropped.
    fn subscribe(&self, channel: &str) -> Result<Receiver<String>>;

    // =========================================================================
    // Secondary indexes
    // =========================================================================

    /// Creates an index.
    ///
    /// # Errors
    ///
    /// `StorageError::IndexExists` if the name is taken,
    /// `StorageError::InvalidIndex` if the definition is malformed.
    fn create_index(&self, definition: &IndexDefinition) -> Result<()>;

    /// Returns the index definition and document count, or `None`.
    fn index_info(&self, name: &str) -> Result<Option<IndexInfo>>;

    /// Full-text query. Returns up to `limit` hits in relevance order.
    ///
    /// # Errors
    ///
    /// `StorageError::UnknownIndex` if the index does not exist.
    fn search_text(&self, index: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// K-nearest-neighbor query on a vector field, closest first.
    ///
    /// `vector` is a packed little-endian `f32` blob.
    ///
    /// # Errors
    ///
    /// `StorageError::UnknownIndex` if the index does not exist,
    /// `StorageError::InvalidQuery` if the field or blob does not fit.
    fn search_knn(
        &self,
        index: &str,
        field: &str,
        vector: &[u8],
        k: usize,
    ) -> Result<Vec<SearchHit>>;
}
