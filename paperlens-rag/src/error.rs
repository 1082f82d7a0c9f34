//! Error types for the `paperlens-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while loading or serving the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// A mandatory artifact or component could not be loaded. Fatal at startup.
    #[error("Startup failure ({component}): {message}")]
    StartupFailure {
        /// The component that failed to load (index, mapping, corpus, ...).
        component: String,
        /// A description of the failure.
        message: String,
    },

    /// The request was rejected before any model call.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A model backend could not be loaded or reached.
    #[error("Model unavailable ({model}): {message}")]
    ModelUnavailable {
        /// The model or backend name.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An inference or search stage exceeded its configured bound.
    #[error("Upstream timeout: {stage} exceeded {timeout:?}")]
    UpstreamTimeout {
        /// The pipeline stage that timed out.
        stage: &'static str,
        /// The configured bound.
        timeout: Duration,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index.
    #[error("Index error: {0}")]
    IndexError(String),

    /// An error occurred during candidate re-ranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The re-ranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error while reading or writing corpus or index artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON encoding or decoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn startup(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StartupFailure { component: component.into(), message: message.into() }
    }

    /// Whether a client may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
