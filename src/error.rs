//! Error types for the lodgings service.
//!
//! The service uses a hierarchical error system:
//! - `LodgingError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`) provide detail
//!
//! "Not found" is *not* an error: lookups return `Option`,
//! updates return [`UpdateOutcome`](crate::UpdateOutcome) and deletes
//! return `bool`, so callers can tell "no such listing" apart from
//! "operation failed".
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use lodgings::{LodgingService, Result};
//!
//! fn example(service: &LodgingService) -> Result<()> {
//!     let hits = service.text_search("paris", 5)?;
//!     println!("{} hits", hits.len());
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for lodgings operations.
pub type Result<T> = std::result::Result<T, LodgingError>;

/// Top-level error enum for all lodgings operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum LodgingError {
    /// Storage layer error (I/O, corruption, transactions, index queries).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error. Raised before any store write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// The secondary index could not be created. Fatal to the service instance.
    #[error("Index error: {0}")]
    Index(String),

    /// Embedding provider error.
    ///
    /// Only surfaced by [`EmbeddingService`](crate::embedding::EmbeddingService)
    /// implementations; the service itself falls back to the mock vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// JSON encoding/decoding of events or cached results failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A blocking task spawned by the async adapter failed to complete.
    #[error("Task error: {0}")]
    Task(String),
}

impl LodgingError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an index error with the given message.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a task error with the given message.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an index creation error.
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Returns true if this is an embedding error.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// An index with this name is already defined.
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// No index with this name is defined.
    #[error("Unknown index name: {0}")]
    UnknownIndex(String),

    /// The index definition was rejected by the store.
    #[error("Invalid index definition: {0}")]
    InvalidIndex(String),

    /// An index query could not be executed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates an invalid index definition error.
    pub fn invalid_index(msg: impl Into<String>) -> Self {
        Self::InvalidIndex(msg.into())
    }

    /// Creates an invalid query error.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Returns true if this error reports an already-existing index.
    pub fn is_index_exists(&self) -> bool {
        matches!(self, Self::IndexExists(_))
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to LodgingError for convenience
impl From<redb::Error> for LodgingError {
    fn from(err: redb::Error) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for LodgingError {
    fn from(err: redb::DatabaseError) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for LodgingError {
    fn from(err: redb::TransactionError) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for LodgingError {
    fn from(err: redb::CommitError) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for LodgingError {
    fn from(err: redb::TableError) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for LodgingError {
    fn from(err: redb::StorageError) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for LodgingError {
    fn from(err: bincode::Error) -> Self {
        LodgingError::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for LodgingError {
    fn from(err: serde_json::Error) -> Self {
        LodgingError::Serialization(err.to_string())
    }
}

/// Validation errors for caller-supplied listing data.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// A listing with this id is already stored.
    #[error("Listing already exists: {id}")]
    DuplicateId {
        /// The conflicting listing id.
        id: String,
    },

    /// Embedding dimension doesn't match the index dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },
}

impl ValidationError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a duplicate id error.
    pub fn duplicate_id(id: impl ToString) -> Self {
        Self::DuplicateId { id: id.to_string() }
    }

    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }
}
