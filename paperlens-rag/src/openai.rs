//! Remote embeddings through an OpenAI-compatible `/embeddings` endpoint.
//!
//! Enabled by the `openai` feature. vLLM, text-embeddings-inference and
//! Ollama expose the same route; point at them with
//! [`OpenAIEmbeddingProvider::with_base_url`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
/// Output size of [`DEFAULT_MODEL`].
const DEFAULT_DIMENSIONS: usize = 1536;
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Embeds passages and queries with a hosted model.
///
/// The index must be built and queried with the same model and size; the
/// model name is recorded in the index file and checked when it loads.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// Sent as `dimensions` when the caller asked for truncated vectors.
    truncate_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] if `api_key` is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(unavailable("API key is empty"));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            truncate_to: None,
        })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) => Self::new(key),
            Err(_) => Err(unavailable(&format!("{API_KEY_VAR} is not set"))),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Ask the server for vectors of `dims` components. Only models with
    /// Matryoshka training honor this.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.truncate_to = Some(dims);
        self
    }

    fn failure(&self, message: impl Into<String>) -> RagError {
        RagError::EmbeddingError {
            provider: format!("openai:{}", self.model),
            message: message.into(),
        }
    }

    async fn post(&self, input: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingsRequest { model: &self.model, input, dimensions: self.truncate_to };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.failure(format!("request to {} failed: {e}", self.base_url)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            warn!(model = %self.model, %status, "embeddings request rejected");
            return Err(self.failure(format!("{status}: {message}")));
        }

        let mut payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| self.failure(format!("malformed response: {e}")))?;
        if payload.data.len() != input.len() {
            return Err(self.failure(format!(
                "sent {} inputs but received {} embeddings",
                input.len(),
                payload.data.len()
            )));
        }
        // Items carry their input position; the array order is not guaranteed.
        payload.data.sort_by_key(|item| item.index);
        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

fn unavailable(message: &str) -> RagError {
    RagError::ModelUnavailable { model: DEFAULT_MODEL.to_string(), message: message.to_string() }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Deserialize)]
struct ApiErrorMessage {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.post(&[text]).await?;
        vectors.pop().ok_or_else(|| self.failure("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "requesting embeddings");
        self.post(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_model_unavailable() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new("  "),
            Err(RagError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn builder_overrides_apply() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/")
            .with_model("bge-small-en-v1.5")
            .with_dimensions(384);
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
        assert_eq!(provider.model_name(), "bge-small-en-v1.5");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn request_omits_unset_dimensions() {
        let body = EmbeddingsRequest { model: "m", input: &["a"], dimensions: None };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("dimensions").is_none());
    }
}
