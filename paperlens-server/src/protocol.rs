//! JSON bodies exchanged over the HTTP API.

use serde::{Deserialize, Serialize};

pub use paperlens_rag::{SearchHit, SearchResponse};
pub use paperlens_summary::{Article, ArticleSummary, SummaryReport};

/// `POST /search` body. `top_k` falls back to the configured default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
}

/// `POST /summarize` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummarizeRequest {
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Readiness of one pipeline component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentHealth {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn ready(detail: impl Into<String>) -> Self {
        Self { ready: true, detail: Some(detail.into()) }
    }

    pub fn unavailable(detail: Option<String>) -> Self {
        Self { ready: false, detail }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Components {
    pub embedder: ComponentHealth,
    pub index: ComponentHealth,
    pub reranker: ComponentHealth,
    pub summarizer: ComponentHealth,
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub components: Components,
}

/// Error body: `{"error": {"code", "message", "retryable"}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}
