use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::context::SearchContext;
use crate::error::ApiError;
use crate::protocol::{
    HealthResponse, SearchRequest, SearchResponse, SummarizeRequest, SummaryReport,
};

#[derive(Clone, Debug)]
pub struct AppState {
    pub context: Arc<SearchContext>,
}

impl AppState {
    pub fn new(context: SearchContext) -> Self {
        Self { context: Arc::new(context) }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/summarize", post(summarize))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve `state` until `shutdown` resolves, then drain in-flight requests.
pub async fn run_server(
    config: ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid host/port {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("paperlens listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.context.health())
}

async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload?;
    let service = state.context.search();
    let top_k = request.top_k.unwrap_or(service.config().default_top_k as i64);
    let response = service.search(&request.query, top_k).await?;
    Ok(Json(response))
}

async fn summarize(
    State(state): State<AppState>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummaryReport>, ApiError> {
    let Json(request) = payload?;
    let summarizer = state.context.summarizer().ok_or(ApiError::SummarizerUnavailable)?;
    let report = summarizer.summarize_articles(&request.articles).await?;
    Ok(Json(report))
}
