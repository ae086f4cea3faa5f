//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb store. Every
//! store primitive (hashes, ranked sets, streams, expiring values, index
//! definitions) lives in its own table.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE        &str → bincode DatabaseMetadata        │
//! │ HASHES_TABLE          key → bincode HashFields               │
//! │ RANKED_TABLE          (set key, member) → f64 score          │
//! │ STREAMS_TABLE         (stream key, seq) → bincode entry      │
//! │ EXPIRING_TABLE        key → bincode ExpiringValue            │
//! │ INDEXES_TABLE         index name → bincode IndexDefinition   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The store will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

/// Metadata key in the metadata table.
pub const METADATA_KEY: &str = "db_metadata";

// ============================================================================
// Table Definitions
// ============================================================================

/// Store-level information (schema version, timestamps).
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Field maps, one per hash key.
pub const HASHES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("hashes");

/// Ranked set members and their scores.
///
/// Keyed by (set key, member) so one set is a contiguous key range.
pub const RANKED_TABLE: TableDefinition<(&str, &str), f64> = TableDefinition::new("ranked");

/// Append-only stream entries.
///
/// Keyed by (stream key, sequence); sequences grow monotonically per stream,
/// so key order is append order.
pub const STREAMS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("streams");

/// Values with an expiry deadline.
pub const EXPIRING_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("expiring");

/// Secondary index definitions.
pub const INDEXES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("indexes");

// ============================================================================
// Stored records
// ============================================================================

/// Store metadata persisted in the metadata table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Timestamp when the store was created.
    pub created_at: Timestamp,

    /// Last time the store was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh store.
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

impl Default for DatabaseMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A value together with its expiry deadline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ExpiringValue {
    pub(crate) expires_at: Timestamp,
    pub(crate) value: Vec<u8>,
}

impl ExpiringValue {
    pub(crate) fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Body of one stream entry (the sequence lives in the key).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct StoredStreamEntry {
    pub(crate) timestamp: Timestamp,
    pub(crate) fields: Vec<(String, String)>,
}
