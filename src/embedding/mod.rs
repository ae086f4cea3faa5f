//! Embedding providers and the cached, infallible embedding lookup.
//!
//! Embeddings are dense vector representations of text used for semantic
//! search. Every stored and queried embedding has
//! [`EMBEDDING_DIMENSION`](crate::vector::EMBEDDING_DIMENSION) components.
//!
//! # Providers
//!
//! - No provider (mock mode): a deterministic vector, see [`mock_embedding`]
//! - [`MockEmbedding`]: the same vector behind the [`EmbeddingService`] trait
//! - `OpenAiEmbedding`: OpenAI-compatible HTTP API (requires `openai` feature)
//!
//! The service never sees provider errors: [`EmbeddingCache::embedding_for`]
//! degrades to the mock vector and logs a warning.
//!
//! # Example
//!
//! ```rust
//! use lodgings::embedding::{mock_embedding, EmbeddingService, MockEmbedding};
//!
//! let service = MockEmbedding;
//! assert_eq!(service.dimension(), 1536);
//! assert_eq!(service.embed("Paris").unwrap(), mock_embedding("paris"));
//! ```

pub mod cache;
#[cfg(feature = "openai")]
pub mod openai;

pub use cache::{embedding_cache_key, EmbeddingCache};

use crate::config::{Config, EmbeddingProvider};
use crate::error::Result;
use crate::types::Embedding;
use crate::vector::EMBEDDING_DIMENSION;

/// Mock component value for texts mentioning Paris.
pub const MOCK_PARIS_VALUE: f32 = 0.9;

/// Mock component value for every other text.
pub const MOCK_DEFAULT_VALUE: f32 = 0.1;

/// Embedding service trait for generating vector representations of text.
///
/// Implementations must be thread-safe (`Send + Sync`): one instance serves
/// every concurrent caller.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use lodgings::embedding::EmbeddingService;
/// use lodgings::{Embedding, Result};
///
/// struct MyEmbeddingService {
///     client: MyApiClient,
/// }
///
/// impl EmbeddingService for MyEmbeddingService {
///     fn embed(&self, text: &str) -> Result<Embedding> {
///         Ok(self.client.get_embedding(text)?)
///     }
///
///     fn dimension(&self) -> usize {
///         1536
///     }
/// }
/// ```
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Embedding` if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Returns the dimension of embeddings produced by this service.
    ///
    /// The service refuses a provider reporting anything but
    /// [`EMBEDDING_DIMENSION`](crate::vector::EMBEDDING_DIMENSION).
    fn dimension(&self) -> usize;
}

/// Deterministic placeholder embedding.
///
/// Every component is `0.9` if the lowercased text contains `"paris"`,
/// `0.1` otherwise. All mock vectors point the same way, so the cosine
/// distance between any two is (nearly) zero.
pub fn mock_embedding(text: &str) -> Embedding {
    let value = if text.to_lowercase().contains("paris") {
        MOCK_PARIS_VALUE
    } else {
        MOCK_DEFAULT_VALUE
    };
    vec![value; EMBEDDING_DIMENSION]
}

/// [`mock_embedding`] behind the [`EmbeddingService`] trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockEmbedding;

impl EmbeddingService for MockEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(mock_embedding(text))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}

/// Creates the embedding provider described by the configuration.
///
/// Returns `Ok(None)` in mock mode: no provider is consulted and the mock
/// vector is used directly.
///
/// # Errors
///
/// Returns `LodgingError::Config` if the OpenAI provider is requested but
/// the `openai` feature is disabled, or its client cannot be built.
pub fn create_embedding_service(config: &Config) -> Result<Option<Box<dyn EmbeddingService>>> {
    match &config.embedding_provider {
        EmbeddingProvider::Mock => Ok(None),

        #[cfg(feature = "openai")]
        EmbeddingProvider::OpenAi {
            api_key,
            model,
            base_url,
            timeout,
        } => {
            let service = openai::OpenAiEmbedding::new(api_key, model, base_url, *timeout)?;
            Ok(Some(Box::new(service)))
        }

        #[cfg(not(feature = "openai"))]
        EmbeddingProvider::OpenAi { .. } => Err(crate::error::LodgingError::config(
            "OpenAI embeddings require the 'openai' feature",
        )),
    }
}
