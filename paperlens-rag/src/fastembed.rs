//! Local ONNX models through fastembed.
//!
//! Available with the `fastembed` feature. Provides a bi-encoder
//! [`FastEmbedProvider`] for the vector index and a cross-encoder
//! [`CrossEncoderScorer`] for re-ranking. Both models run on the blocking
//! thread pool; a mutex serializes inference on each model.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, InitOptions, RerankInitOptions, RerankerModel, TextEmbedding, TextRerank,
};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::reranker::RelevanceScorer;

/// Default bi-encoder, matching the published index artifacts.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Default cross-encoder.
pub const DEFAULT_RERANKER_MODEL: &str = "bge-reranker-base";

fn embedding_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let short = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();
    let model = match short.as_str() {
        "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "all-minilm-l12-v2" => (EmbeddingModel::AllMiniLML12V2, 384),
        "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
        _ => return None,
    };
    Some(model)
}

fn reranker_model(name: &str) -> Option<RerankerModel> {
    let short = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();
    match short.as_str() {
        "bge-reranker-base" => Some(RerankerModel::BGERerankerBase),
        "jina-reranker-v1-turbo-en" => Some(RerankerModel::JINARerankerV1TurboEn),
        _ => None,
    }
}

fn unavailable(model: &str, message: impl Into<String>) -> RagError {
    RagError::ModelUnavailable { model: model.to_string(), message: message.into() }
}

/// Bi-encoder embeddings computed locally.
#[derive(Clone)]
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Load the named model, downloading it into `cache_dir` on first use.
    ///
    /// Accepts either the bare model name or a `sentence-transformers/`-style
    /// prefixed one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] for an unknown name or a
    /// model that fails to load.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (model, dimensions) = embedding_model(model_name)
            .ok_or_else(|| unavailable(model_name, "unsupported embedding model"))?;

        let mut options = InitOptions::new(model);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let embedding = TextEmbedding::try_new(options)
            .map_err(|e| unavailable(model_name, format!("failed to load: {e}")))?;

        info!(model = model_name, dimensions, "embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    fn error(&self, message: String) -> RagError {
        RagError::EmbeddingError { provider: format!("fastembed/{}", self.model_name), message }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| self.error("no embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let model = Arc::clone(&self.model);
        let output = tokio::task::spawn_blocking(move || {
            let model = model.lock().map_err(|_| "embedding model lock poisoned".to_string())?;
            model.embed(owned, None).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| self.error(format!("embedding task failed: {e}")))?
        .map_err(|e| self.error(e))?;

        debug!(model = %self.model_name, batch_size = texts.len(), "embedded locally");
        Ok(output)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Cross-encoder relevance scoring computed locally.
#[derive(Clone)]
pub struct CrossEncoderScorer {
    model: Arc<Mutex<TextRerank>>,
    model_name: String,
}

impl std::fmt::Debug for CrossEncoderScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossEncoderScorer").field("model_name", &self.model_name).finish()
    }
}

impl CrossEncoderScorer {
    /// Load the named cross-encoder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] for an unknown name or a
    /// model that fails to load.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let model = reranker_model(model_name)
            .ok_or_else(|| unavailable(model_name, "unsupported reranker model"))?;

        let mut options = RerankInitOptions::new(model);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let rerank = TextRerank::try_new(options)
            .map_err(|e| unavailable(model_name, format!("failed to load: {e}")))?;

        info!(model = model_name, "reranker model loaded");
        Ok(Self { model: Arc::new(Mutex::new(rerank)), model_name: model_name.to_string() })
    }

    fn error(&self, message: String) -> RagError {
        RagError::RerankerError { reranker: self.model_name.clone(), message }
    }
}

#[async_trait]
impl RelevanceScorer for CrossEncoderScorer {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let query = query.to_string();
        let owned: Vec<String> = passages.iter().map(|p| p.to_string()).collect();
        let count = owned.len();
        let model = Arc::clone(&self.model);
        let ranked = tokio::task::spawn_blocking(move || {
            let model = model.lock().map_err(|_| "reranker model lock poisoned".to_string())?;
            let documents: Vec<&str> = owned.iter().map(String::as_str).collect();
            model.rerank(query.as_str(), documents, false, None).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| self.error(format!("rerank task failed: {e}")))?
        .map_err(|e| self.error(e))?;

        // fastembed returns results sorted by score; put them back in input order.
        let mut scores = vec![f32::NEG_INFINITY; count];
        for result in ranked {
            match scores.get_mut(result.index) {
                Some(slot) => *slot = result.score,
                None => return Err(self.error(format!("result index {} out of range", result.index))),
            }
        }
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_resolve_with_or_without_prefix() {
        assert!(matches!(embedding_model("all-MiniLM-L6-v2"), Some((_, 384))));
        assert!(matches!(
            embedding_model("sentence-transformers/all-MiniLM-L6-v2"),
            Some((_, 384))
        ));
        assert!(matches!(embedding_model("BAAI/bge-base-en-v1.5"), Some((_, 768))));
        assert!(embedding_model("no-such-model").is_none());
    }

    #[test]
    fn reranker_names_resolve() {
        assert!(reranker_model("BAAI/bge-reranker-base").is_some());
        assert!(reranker_model("cross-encoder/ms-marco-MiniLM-L-6-v2").is_none());
    }

    #[test]
    fn unknown_model_is_unavailable() {
        let err = FastEmbedProvider::new("no-such-model", None).unwrap_err();
        assert!(matches!(err, RagError::ModelUnavailable { .. }));
        let err = CrossEncoderScorer::new("no-such-model", None).unwrap_err();
        assert!(matches!(err, RagError::ModelUnavailable { .. }));
    }
}
