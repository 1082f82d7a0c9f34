//! Text-to-text generation backends.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Result, SummaryError};

/// Decoding parameters passed to the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum summary length, in tokens.
    pub max_length: u32,
    /// Minimum summary length, in tokens.
    pub min_length: u32,
    pub num_beams: u32,
    pub length_penalty: f32,
    pub no_repeat_ngram_size: u32,
    pub repetition_penalty: f32,
    pub early_stopping: bool,
}

impl GenerationParams {
    /// Parameters for summarizing one article.
    pub const fn article() -> Self {
        Self {
            max_length: 120,
            min_length: 40,
            num_beams: 4,
            length_penalty: 2.0,
            no_repeat_ngram_size: 3,
            repetition_penalty: 1.2,
            early_stopping: true,
        }
    }

    /// Parameters for the final synthesis over all article summaries.
    pub const fn synthesis() -> Self {
        Self { max_length: 250, min_length: 100, num_beams: 5, length_penalty: 2.5, ..Self::article() }
    }
}

/// A black-box text-to-text model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Where the model is served, reported by the health check.
    fn endpoint(&self) -> &str;
}

/// A [`TextGenerator`] that calls a HuggingFace-inference-style HTTP endpoint.
///
/// Sends `{"inputs": ..., "parameters": {...}}` and accepts either
/// `[{"summary_text": ...}]` or `[{"generated_text": ...}]`.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationParams,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GeneratedItem {
    Summary { summary_text: String },
    Generated { generated_text: String },
}

impl GeneratedItem {
    fn into_text(self) -> String {
        match self {
            Self::Summary { summary_text } => summary_text,
            Self::Generated { generated_text } => generated_text,
        }
    }
}

impl HttpGenerator {
    /// Create a client for `endpoint`, bounding every call by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Unavailable`] if the endpoint is empty or the
    /// HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(SummaryError::Unavailable {
                endpoint,
                message: "endpoint must not be empty".into(),
            });
        }
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            SummaryError::Unavailable { endpoint: endpoint.clone(), message: e.to_string() }
        })?;
        Ok(Self { client, endpoint, token: None })
    }

    /// Authenticate with a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn unavailable(&self, message: String) -> SummaryError {
        SummaryError::Unavailable { endpoint: self.endpoint.clone(), message }
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), max_length = params.max_length, "generating");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { inputs: prompt, parameters: params });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "generation request failed");
            self.unavailable(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(endpoint = %self.endpoint, %status, "generation service error");
            return Err(if status.is_server_error() {
                self.unavailable(format!("service returned {status}: {body}"))
            } else {
                SummaryError::Generator(format!("service returned {status}: {body}"))
            });
        }

        let items: Vec<GeneratedItem> = response
            .json()
            .await
            .map_err(|e| SummaryError::Generator(format!("unexpected response body: {e}")))?;
        items
            .into_iter()
            .next()
            .map(GeneratedItem::into_text)
            .ok_or_else(|| SummaryError::Generator("service returned no output".into()))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_keeps_anti_repetition_settings() {
        let params = GenerationParams::synthesis();
        assert_eq!((params.max_length, params.min_length, params.num_beams), (250, 100, 5));
        assert_eq!(params.no_repeat_ngram_size, 3);
        assert_eq!(params.repetition_penalty, 1.2);
    }

    #[test]
    fn accepts_both_response_shapes() {
        let items: Vec<GeneratedItem> =
            serde_json::from_str(r#"[{"summary_text":"a"},{"generated_text":"b"}]"#).unwrap();
        let texts: Vec<String> = items.into_iter().map(GeneratedItem::into_text).collect();
        assert_eq!(texts, ["a", "b"]);
    }

    #[test]
    fn empty_endpoint_is_unavailable() {
        let err = HttpGenerator::new(" ", Duration::from_secs(1)).unwrap_err();
        assert!(err.is_retryable());
    }
}
