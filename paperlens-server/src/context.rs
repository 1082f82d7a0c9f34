//! Immutable components shared by every request.

use paperlens_rag::SearchService;
use paperlens_summary::Summarizer;

use crate::protocol::{ComponentHealth, Components, HealthResponse, HealthStatus};

/// Everything loaded at startup: the search pipeline, the optional
/// summarizer, and why an optional component is missing.
///
/// Built once and never mutated; whether re-ranking and summarization are
/// available is fixed for the lifetime of the process.
#[derive(Debug)]
pub struct SearchContext {
    search: SearchService,
    summarizer: Option<Summarizer>,
    reranker_error: Option<String>,
    summarizer_error: Option<String>,
}

impl SearchContext {
    pub fn new(search: SearchService) -> Self {
        Self { search, summarizer: None, reranker_error: None, summarizer_error: None }
    }

    pub fn with_summarizer(mut self, summarizer: Option<Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Record why the re-ranker failed to load, for the health report.
    pub fn with_reranker_error(mut self, reason: impl Into<String>) -> Self {
        self.reranker_error = Some(reason.into());
        self
    }

    /// Record why the summarizer failed to load, for the health report.
    pub fn with_summarizer_error(mut self, reason: impl Into<String>) -> Self {
        self.summarizer_error = Some(reason.into());
        self
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn summarizer(&self) -> Option<&Summarizer> {
        self.summarizer.as_ref()
    }

    /// Readiness of every component. The service is `ok` only when all of
    /// them are ready.
    pub fn health(&self) -> HealthResponse {
        let embedder = self.search.embedder();
        let index = self.search.retriever().index();

        let reranker = match self.search.reranker() {
            Some(reranker) => ComponentHealth::ready(reranker.model_name()),
            None => ComponentHealth::unavailable(
                self.reranker_error.clone().or_else(|| Some("not configured".to_string())),
            ),
        };
        let summarizer = match &self.summarizer {
            Some(summarizer) => ComponentHealth::ready(summarizer.endpoint()),
            None => ComponentHealth::unavailable(
                self.summarizer_error.clone().or_else(|| Some("not configured".to_string())),
            ),
        };

        let components = Components {
            embedder: ComponentHealth::ready(format!(
                "{} ({} dimensions)",
                embedder.model_name(),
                embedder.dimensions()
            )),
            index: ComponentHealth::ready(format!(
                "{} documents, dimension {}",
                index.len(),
                index.dimension()
            )),
            reranker,
            summarizer,
        };
        let all_ready = [
            &components.embedder,
            &components.index,
            &components.reranker,
            &components.summarizer,
        ]
        .iter()
        .all(|c| c.ready);

        HealthResponse {
            status: if all_ready { HealthStatus::Ok } else { HealthStatus::Degraded },
            components,
        }
    }
}
