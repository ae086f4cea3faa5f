//! Core type definitions for listing identifiers, timestamps and embeddings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Embedding vector type.
pub type Embedding = Vec<f32>;

/// Listing identifier.
///
/// Ids are opaque strings chosen by the caller at creation time and never
/// change afterwards. [`ListingId::generate`] hands out a UUID v7 string for
/// callers without an id scheme of their own.
///
/// # Example
/// ```
/// use lodgings::ListingId;
///
/// let id = ListingId::generate();
/// assert!(!id.as_str().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(String);

impl ListingId {
    /// Wraps an existing identifier.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh identifier from a UUID v7 (time-ordered).
    #[inline]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ListingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch, returns the epoch
    /// rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns this timestamp shifted forward by `duration`, saturating.
    #[inline]
    pub fn saturating_add(&self, duration: std::time::Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
