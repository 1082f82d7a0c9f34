//! Search service orchestrator.
//!
//! The [`SearchService`] runs one query through the full pipeline:
//! embed → retrieve (with over-fetch when re-ranking) → rerank → order →
//! truncate → shape. It is built once at startup from immutable components
//! and shared across concurrent requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use paperlens_rag::{SearchConfig, SearchService};
//!
//! let service = SearchService::builder()
//!     .config(SearchConfig::default())
//!     .embedder(embedder)
//!     .retriever(retriever)
//!     .reranker(reranker) // optional
//!     .build()?;
//!
//! let response = service.search("retrieval augmented generation", 5).await?;
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::{SearchConfig, TieBreak};
use crate::document::{Candidate, SearchHit};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::retriever::Retriever;

/// The outcome of one search request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    /// Whether scores come from the cross-encoder.
    pub reranked: bool,
}

/// The search pipeline orchestrator.
///
/// Whether re-ranking runs is fixed at construction: a service built without
/// a [`Reranker`] always serves initial similarity scores and never
/// over-fetches.
#[derive(Debug)]
pub struct SearchService {
    config: SearchConfig,
    embedder: Embedder,
    retriever: Retriever,
    reranker: Option<Reranker>,
}

impl SearchService {
    /// Create a new [`SearchServiceBuilder`].
    pub fn builder() -> SearchServiceBuilder {
        SearchServiceBuilder::default()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn reranker(&self) -> Option<&Reranker> {
        self.reranker.as_ref()
    }

    pub fn rerank_enabled(&self) -> bool {
        self.reranker.is_some()
    }

    /// Number of candidates pulled from the index for a request of `top_k`.
    pub fn fetch_k(&self, top_k: usize) -> usize {
        if self.rerank_enabled() {
            top_k.saturating_mul(self.config.overfetch_factor)
        } else {
            top_k
        }
    }

    /// Check a request before any model call.
    ///
    /// Returns the accepted result count.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidQuery`] for a blank query or a negative
    /// `top_k`. Any non-negative `top_k` is accepted; the index never yields
    /// more than the corpus holds.
    pub fn validate(&self, query: &str, top_k: i64) -> Result<usize> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }
        usize::try_from(top_k)
            .map_err(|_| RagError::InvalidQuery(format!("top_k must not be negative, got {top_k}")))
    }

    /// Run a search and return at most `top_k` hits, best first.
    ///
    /// `top_k == 0` returns an empty list without calling any model. A
    /// `top_k` above the corpus size returns every available document.
    ///
    /// Dropping the returned future abandons the request; no partial result
    /// is ever produced.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] if validation fails
    /// - [`RagError::UpstreamTimeout`] if a stage exceeds its bound
    /// - embedding, index, or reranker errors from the respective stage
    pub async fn search(&self, query: &str, top_k: i64) -> Result<SearchResponse> {
        let span = info_span!("search", request_id = %Uuid::new_v4(), top_k);
        self.run(query, top_k).instrument(span).await
    }

    /// Like [`search`](Self::search), but gives up with
    /// [`RagError::Cancelled`] as soon as `cancel` fires.
    pub async fn search_cancellable(
        &self,
        query: &str,
        top_k: i64,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RagError::Cancelled),
            result = self.search(query, top_k) => result,
        };
        // A result that raced with cancellation is discarded.
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }
        outcome
    }

    async fn run(&self, query: &str, top_k: i64) -> Result<SearchResponse> {
        let top_k = self.validate(query, top_k)?;
        let reranked = self.rerank_enabled();
        if top_k == 0 {
            return Ok(SearchResponse { results: Vec::new(), reranked });
        }

        // 1. Embed the query
        let started = Instant::now();
        let query_vector =
            bounded("embed", self.config.embed_timeout, self.embedder.embed_query(query)).await?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "query embedded");

        // 2. Retrieve candidates, over-fetching when a reranker will narrow them down
        let fetch_k = self.fetch_k(top_k);
        let started = Instant::now();
        let retriever = self.retriever.clone();
        let scan = async move {
            tokio::task::spawn_blocking(move || retriever.retrieve(&query_vector, fetch_k))
                .await
                .map_err(|e| RagError::IndexError(format!("index scan task failed: {e}")))?
        };
        let mut candidates = bounded("index_search", self.config.search_timeout, scan).await?;
        debug!(
            fetch_k,
            candidates = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "candidates retrieved"
        );

        // 3. Rerank if a reranker is configured
        if let Some(reranker) = &self.reranker {
            let started = Instant::now();
            candidates =
                bounded("rerank", self.config.rerank_timeout, reranker.rerank(query, candidates))
                    .await?;
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "candidates reranked");
        }

        // 4. Order, truncate, and shape
        order_candidates(&mut candidates, self.config.tie_break);
        candidates.truncate(top_k);
        let results: Vec<SearchHit> = candidates.into_iter().map(SearchHit::from).collect();

        info!(result_count = results.len(), reranked, "search completed");
        Ok(SearchResponse { results, reranked })
    }
}

/// Sort by descending final score, breaking ties per `tie_break`.
pub fn order_candidates(candidates: &mut [Candidate], tie_break: TieBreak) {
    candidates.sort_by(|a, b| {
        let by_score = b.final_score().total_cmp(&a.final_score());
        match tie_break {
            TieBreak::RetrievalOrder => by_score.then(a.retrieval_rank.cmp(&b.retrieval_rank)),
            TieBreak::DocumentId => by_score.then_with(|| a.id.cmp(&b.id)),
        }
    });
}

async fn bounded<T>(
    stage: &'static str,
    timeout: Duration,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        Err(_) => {
            warn!(stage, ?timeout, "stage timed out");
            Err(RagError::UpstreamTimeout { stage, timeout })
        }
    }
}

/// Builder for constructing a [`SearchService`].
///
/// All fields except `reranker` are required; `config` defaults to
/// [`SearchConfig::default`].
#[derive(Default)]
pub struct SearchServiceBuilder {
    config: Option<SearchConfig>,
    embedder: Option<Embedder>,
    retriever: Option<Retriever>,
    reranker: Option<Reranker>,
}

impl SearchServiceBuilder {
    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Set the cross-encoder used to reorder candidates.
    pub fn reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the reranker from a startup load that may have failed.
    pub fn maybe_reranker(mut self, reranker: Option<Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Build the [`SearchService`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedder or retriever is
    /// missing, or if the embedder's dimension differs from the index's.
    pub fn build(self) -> Result<SearchService> {
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let retriever = self
            .retriever
            .ok_or_else(|| RagError::ConfigError("retriever is required".to_string()))?;
        if embedder.dimensions() != retriever.index().dimension() {
            return Err(RagError::ConfigError(format!(
                "embedder dimension {} does not match index dimension {}",
                embedder.dimensions(),
                retriever.index().dimension()
            )));
        }

        Ok(SearchService {
            config: self.config.unwrap_or_default(),
            embedder,
            retriever,
            reranker: self.reranker,
        })
    }
}
