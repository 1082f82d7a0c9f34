//! `paperlens-server` exposes the search pipeline and the summarizer over
//! HTTP: `POST /search`, `POST /summarize` and `GET /health`.

pub mod context;
pub mod error;
pub mod protocol;
pub mod server;

pub use context::SearchContext;
pub use error::ApiError;
pub use server::{AppState, ServerConfig, app_router, run_server, shutdown_signal};
