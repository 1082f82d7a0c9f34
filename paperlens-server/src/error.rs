//! Mapping of pipeline errors onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paperlens_rag::RagError;
use paperlens_summary::SummaryError;
use thiserror::Error;
use tracing::{error, warn};

use crate::protocol::{ErrorBody, ErrorDetail};

/// An error returned by a request handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Search(#[from] RagError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error("summarizer is not configured")]
    SummarizerUnavailable,

    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Search(RagError::InvalidQuery(_)) => (StatusCode::BAD_REQUEST, "invalid_query"),
            Self::Search(RagError::UpstreamTimeout { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_timeout")
            }
            Self::Search(RagError::Cancelled) => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            Self::Search(RagError::ModelUnavailable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable")
            }
            Self::Search(_) => (StatusCode::INTERNAL_SERVER_ERROR, "search_failed"),
            Self::Summary(SummaryError::InvalidRequest(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            Self::Summary(SummaryError::Unavailable { .. }) | Self::SummarizerUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "summarizer_unavailable")
            }
            Self::Summary(SummaryError::Generator(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "summarization_failed")
            }
        }
    }

    /// Whether a client may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Search(e) => e.is_retryable(),
            Self::Summary(e) => e.is_retryable(),
            Self::SummarizerUnavailable | Self::BadRequest(_) => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(%status, code, error = %self, "request failed");
        } else {
            warn!(%status, code, error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                retryable: self.is_retryable(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (ApiError::from(RagError::InvalidQuery("empty".into())), StatusCode::BAD_REQUEST, false),
            (
                ApiError::from(RagError::UpstreamTimeout {
                    stage: "embed",
                    timeout: Duration::from_secs(1),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
                true,
            ),
            (ApiError::from(RagError::IndexError("x".into())), StatusCode::INTERNAL_SERVER_ERROR, false),
            (ApiError::SummarizerUnavailable, StatusCode::SERVICE_UNAVAILABLE, false),
            (
                ApiError::from(SummaryError::InvalidRequest("empty".into())),
                StatusCode::BAD_REQUEST,
                false,
            ),
        ];
        for (error, status, retryable) in cases {
            assert_eq!(error.status_and_code().0, status, "{error}");
            assert_eq!(error.is_retryable(), retryable, "{error}");
        }
    }
}
