//! Configuration types for the lodgings service.
//!
//! The [`Config`] struct controls:
//! - Store key names (index, hash prefix, ranked set, stream, channel)
//! - Cache lifetimes for search results and embeddings
//! - The embedding provider (deterministic mock or OpenAI)
//! - Durability and pub/sub settings of the embedded store
//!
//! Reading configuration from files or the environment is left to the
//! process bootstrap; this module only defines and validates the values.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use lodgings::Config;
//!
//! // Use defaults (mock embeddings, 30 s search cache, 50-entry event log)
//! let config = Config::default();
//!
//! // Shorter search cache for an interactive demo
//! let config = Config {
//!     search_cache_ttl: Duration::from_secs(5),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default OpenAI embedding model (1536 dimensions).
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Service configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use lodgings::Config;
///
/// let config = Config {
///     stream_max_len: 100,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the secondary search index.
    pub index_name: String,

    /// Prefix of listing hash keys; also the prefix the index covers.
    pub key_prefix: String,

    /// Ranked set holding popularity scores.
    pub popularity_key: String,

    /// Bounded event log stream.
    pub stream_key: String,

    /// Pub/sub topic and live-socket group for change events.
    pub channel: String,

    /// Number of most recent event log entries kept after each append.
    pub stream_max_len: usize,

    /// Lifetime of cached semantic search results.
    pub search_cache_ttl: Duration,

    /// Lifetime of cached embeddings.
    pub embedding_cache_ttl: Duration,

    /// Image URL stored when a listing is created without one.
    pub default_image_url: String,

    /// How embeddings are generated.
    pub embedding_provider: EmbeddingProvider,

    /// Durability mode for store writes.
    pub sync_mode: SyncMode,

    /// Capacity of each pub/sub subscriber's channel, and of each client
    /// queue of the default socket bridge.
    ///
    /// A subscriber that falls this far behind misses messages.
    pub subscriber_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_name: "lodgings_idx".to_string(),
            key_prefix: "lodging:".to_string(),
            popularity_key: "lodgings_popularity".to_string(),
            stream_key: "lodgings_stream".to_string(),
            channel: "lodgings_channel".to_string(),
            stream_max_len: 50,
            search_cache_ttl: Duration::from_secs(30),
            embedding_cache_ttl: Duration::from_secs(24 * 60 * 60),
            default_image_url: "https://placehold.co/600x400?text=Lodging".to_string(),
            // Mock is the safe default - no network access or credential required
            embedding_provider: EmbeddingProvider::Mock,
            sync_mode: SyncMode::Normal,
            subscriber_capacity: 1024,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config that embeds text through the OpenAI API.
    ///
    /// Requires the `openai` feature at runtime; without it the service
    /// refuses to start.
    ///
    /// # Example
    /// ```rust
    /// use lodgings::Config;
    ///
    /// let config = Config::with_openai("sk-test");
    /// assert!(config.embedding_provider.is_openai());
    /// ```
    pub fn with_openai(api_key: impl Into<String>) -> Self {
        Self {
            embedding_provider: EmbeddingProvider::OpenAi {
                api_key: api_key.into(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                timeout: Duration::from_secs(10),
            },
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `LodgingService::new()` and
    /// `RedbStore::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - any key name or the key prefix is empty
    /// - `stream_max_len` or `subscriber_capacity` is 0
    /// - a cache TTL is zero
    /// - the OpenAI provider has an empty API key or model
    pub fn validate(&self) -> Result<(), ValidationError> {
        let names = [
            ("index_name", &self.index_name),
            ("key_prefix", &self.key_prefix),
            ("popularity_key", &self.popularity_key),
            ("stream_key", &self.stream_key),
            ("channel", &self.channel),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ValidationError::required_field(field));
            }
        }

        if self.stream_max_len == 0 {
            return Err(ValidationError::invalid_field(
                "stream_max_len",
                "must be greater than 0",
            ));
        }

        if self.subscriber_capacity == 0 {
            return Err(ValidationError::invalid_field(
                "subscriber_capacity",
                "must be greater than 0",
            ));
        }

        if self.search_cache_ttl.is_zero() {
            return Err(ValidationError::invalid_field(
                "search_cache_ttl",
                "must be greater than 0",
            ));
        }

        if self.embedding_cache_ttl.is_zero() {
            return Err(ValidationError::invalid_field(
                "embedding_cache_ttl",
                "must be greater than 0",
            ));
        }

        if let EmbeddingProvider::OpenAi { api_key, model, .. } = &self.embedding_provider {
            if api_key.trim().is_empty() {
                return Err(ValidationError::required_field("embedding_provider.api_key"));
            }
            if model.trim().is_empty() {
                return Err(ValidationError::required_field("embedding_provider.model"));
            }
        }

        Ok(())
    }

    /// Returns the store key of the listing with the given id.
    #[inline]
    pub fn listing_key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Returns the listing id addressed by `key`, if it carries the prefix.
    #[inline]
    pub fn listing_id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())
    }
}

/// Embedding provider configuration.
#[derive(Clone)]
pub enum EmbeddingProvider {
    /// No provider: every text gets the deterministic mock vector.
    Mock,

    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi {
        /// Bearer token.
        api_key: String,
        /// Model identifier sent with each request.
        model: String,
        /// API base URL, without the `/embeddings` suffix.
        base_url: String,
        /// Per-request timeout enforced by the HTTP client.
        timeout: Duration,
    },
}

impl EmbeddingProvider {
    /// Returns true if no provider is configured.
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock)
    }

    /// Returns true if this is the OpenAI provider.
    pub fn is_openai(&self) -> bool {
        matches!(self, Self::OpenAi { .. })
    }
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => f.write_str("Mock"),
            Self::OpenAi {
                model,
                base_url,
                timeout,
                ..
            } => f
                .debug_struct("OpenAi")
                .field("model", model)
                .field("base_url", base_url)
                .field("timeout", timeout)
                .finish_non_exhaustive(),
        }
    }
}

/// Durability mode for write operations.
///
/// Controls the trade-off between write performance and crash safety.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    #[default]
    Normal,

    /// Async sync (faster writes, may lose recent data on crash).
    Fast,

    /// Sync every write with extra integrity checks (slowest).
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode adds integrity checks to every commit.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode is async (may lose data on crash).
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index_name, "lodgings_idx");
        assert_eq!(config.key_prefix, "lodging:");
        assert_eq!(config.popularity_key, "lodgings_popularity");
        assert_eq!(config.stream_key, "lodgings_stream");
        assert_eq!(config.channel, "lodgings_channel");
        assert_eq!(config.stream_max_len, 50);
        assert_eq!(config.search_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.embedding_cache_ttl, Duration::from_secs(86_400));
        assert!(config.embedding_provider.is_mock());
        assert_eq!(config.sync_mode, SyncMode::Normal);
    }

    #[test]
    fn test_with_openai() {
        let config = Config::with_openai("sk-test");
        assert!(config.embedding_provider.is_openai());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_openai_debug_hides_key() {
        let config = Config::with_openai("sk-very-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains(DEFAULT_OPENAI_MODEL));
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = Config {
            key_prefix: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::RequiredField { field } if field == "key_prefix"));
    }

    #[test]
    fn test_validate_stream_len_zero() {
        let config = Config {
            stream_max_len: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidField { field, .. } if field == "stream_max_len")
        );
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = Config {
            search_cache_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_openai_blank_key() {
        let config = Config::with_openai("   ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_listing_key_round_trip() {
        let config = Config::default();
        let key = config.listing_key("abc");
        assert_eq!(key, "lodging:abc");
        assert_eq!(config.listing_id_from_key(&key), Some("abc"));
        assert_eq!(config.listing_id_from_key("other:abc"), None);
    }

    #[test]
    fn test_sync_mode_checks() {
        assert!(!SyncMode::Normal.is_fast());
        assert!(!SyncMode::Normal.is_paranoid());
        assert!(SyncMode::Fast.is_fast());
        assert!(SyncMode::Paranoid.is_paranoid());
    }
}
