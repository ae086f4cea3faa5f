//! OpenAI-compatible embedding provider.
//!
//! Blocking client for `POST {base_url}/embeddings`, built on `ureq`.
//! Requests carry the model name and the input texts; responses are
//! re-ordered by their `index` field before being returned.
//!
//! No retries: a failed request surfaces as `LodgingError::Embedding`, which
//! the embedding cache turns into the mock vector.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::EmbeddingService;
use crate::error::{LodgingError, Result};
use crate::types::Embedding;
use crate::vector::EMBEDDING_DIMENSION;

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedding {
    agent: ureq::Agent,
    endpoint: String,
    authorization: String,
    model: String,
}

impl OpenAiEmbedding {
    /// Builds a client for `{base_url}/embeddings`.
    ///
    /// # Errors
    ///
    /// Returns `LodgingError::Config` if the API key or model is blank.
    pub fn new(api_key: &str, model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(LodgingError::config("missing OpenAI API key"));
        }
        if model.trim().is_empty() {
            return Err(LodgingError::config("missing OpenAI model name"));
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Ok(Self {
            agent,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            authorization: format!("Bearer {}", api_key.trim()),
            model: model.to_string(),
        })
    }

    /// Returns the endpoint URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self, inputs), fields(model = %self.model, count = inputs.len()))]
    fn request(&self, inputs: &[&str]) -> Result<Vec<Embedding>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &self.authorization)
            .send_json(&request)
            .map_err(|e| LodgingError::embedding(format!("embeddings request failed: {e}")))?;

        let mut parsed: EmbeddingResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| LodgingError::embedding(format!("invalid embeddings response: {e}")))?;

        if parsed.data.len() != inputs.len() {
            return Err(LodgingError::embedding(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        parsed.data.sort_by_key(|entry| entry.index);
        debug!("Embeddings received");
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

impl EmbeddingService for OpenAiEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.request(&[text])?
            .pop()
            .ok_or_else(|| LodgingError::embedding("provider returned no embedding"))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}

impl std::fmt::Debug for OpenAiEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedding")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
