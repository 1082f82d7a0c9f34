//! Embedding provider trait and the normalizing [`Embedder`] wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::index::normalize_l2;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (fastembed, OpenAI, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Implementations must be deterministic: the same text embeds to the same
/// vector regardless of the batch it arrives in.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model, recorded in the index file.
    fn model_name(&self) -> &str;
}

/// Maps text to unit-length vectors through an [`EmbeddingProvider`].
///
/// Used both when building the index and when embedding queries, so both
/// sides go through the same normalization.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.provider.model_name())
            .field("dimensions", &self.provider.dimensions())
            .finish()
    }
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed `texts`, returning one L2-normalized vector per input, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the backend fails, returns the
    /// wrong number of vectors, or returns a vector of the wrong dimension.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.provider.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(self.error(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let expected = self.dimensions();
        for vector in &mut vectors {
            if vector.len() != expected {
                return Err(self.error(format!(
                    "expected dimension {expected}, got {}",
                    vector.len()
                )));
            }
            normalize_l2(vector);
        }

        debug!(model = self.model_name(), batch_size = texts.len(), "embedded batch");
        Ok(vectors)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .pop()
            .ok_or_else(|| self.error("backend returned no embedding".to_string()))
    }

    fn error(&self, message: String) -> RagError {
        RagError::EmbeddingError { provider: self.model_name().to_string(), message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; self.dims];
            v[0] = text.len() as f32;
            v[1] = 1.0;
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct WrongDims;

    #[async_trait]
    impl EmbeddingProvider for WrongDims {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "wrong"
        }
    }

    #[tokio::test]
    async fn outputs_are_unit_length_and_ordered() {
        let embedder = Embedder::new(Arc::new(FixedProvider { dims: 4 }));
        let vectors = embedder.embed(&["a", "abcd", "ab"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        for v in &vectors {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-6);
        }
        // Longer text puts more weight on the first component.
        assert!(vectors[1][0] > vectors[2][0] && vectors[2][0] > vectors[0][0]);
    }

    #[tokio::test]
    async fn batching_does_not_change_outputs() {
        let embedder = Embedder::new(Arc::new(FixedProvider { dims: 4 }));
        let batch = embedder.embed(&["x", "hello"]).await.unwrap();
        let single = embedder.embed_query("hello").await.unwrap();
        assert_eq!(batch[1], single);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let embedder = Embedder::new(Arc::new(WrongDims));
        let err = embedder.embed_query("q").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }
}
