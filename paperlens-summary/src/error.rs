//! Error types for the `paperlens-summary` crate.

use thiserror::Error;

/// Errors that can occur while summarizing articles.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The request cannot be summarized as given.
    #[error("Invalid summary request: {0}")]
    InvalidRequest(String),

    /// The generation service could not be reached or configured.
    #[error("Generator unavailable ({endpoint}): {message}")]
    Unavailable {
        /// The service endpoint.
        endpoint: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation service answered with an error or an unusable body.
    #[error("Generator error: {0}")]
    Generator(String),
}

impl SummaryError {
    /// Whether a client may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// A convenience result type for summarization operations.
pub type Result<T> = std::result::Result<T, SummaryError>;
