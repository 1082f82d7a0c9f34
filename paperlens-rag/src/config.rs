//! Configuration for the search service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How candidates with equal final scores are ordered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the order in which the index returned them (stable sort).
    #[default]
    RetrievalOrder,
    /// Ascending document ID.
    DocumentId,
}

/// Configuration parameters for the search service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Result count used when a request does not name one.
    pub default_top_k: usize,
    /// Candidate pool multiplier applied when re-ranking is active.
    pub overfetch_factor: usize,
    pub tie_break: TieBreak,
    /// Bound on query embedding.
    pub embed_timeout: Duration,
    /// Bound on the vector index scan.
    pub search_timeout: Duration,
    /// Bound on cross-encoder scoring.
    pub rerank_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            overfetch_factor: 3,
            tie_break: TieBreak::RetrievalOrder,
            embed_timeout: Duration::from_secs(10),
            search_timeout: Duration::from_secs(5),
            rerank_timeout: Duration::from_secs(30),
        }
    }
}

impl SearchConfig {
    /// Create a new builder for constructing a [`SearchConfig`].
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    pub fn overfetch_factor(mut self, factor: usize) -> Self {
        self.config.overfetch_factor = factor;
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.config.tie_break = tie_break;
        self
    }

    pub fn embed_timeout(mut self, timeout: Duration) -> Self {
        self.config.embed_timeout = timeout;
        self
    }

    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.config.search_timeout = timeout;
        self
    }

    pub fn rerank_timeout(mut self, timeout: Duration) -> Self {
        self.config.rerank_timeout = timeout;
        self
    }

    /// Build the [`SearchConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `overfetch_factor == 0`
    /// - any timeout is zero
    pub fn build(self) -> Result<SearchConfig> {
        let config = self.config;
        if config.overfetch_factor == 0 {
            return Err(RagError::ConfigError("overfetch_factor must be at least 1".to_string()));
        }
        for (name, timeout) in [
            ("embed_timeout", config.embed_timeout),
            ("search_timeout", config.search_timeout),
            ("rerank_timeout", config.rerank_timeout),
        ] {
            if timeout.is_zero() {
                return Err(RagError::ConfigError(format!("{name} must be non-zero")));
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = SearchConfig::builder().build().unwrap();
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.overfetch_factor, 3);
        assert_eq!(config.tie_break, TieBreak::RetrievalOrder);
    }

    #[test]
    fn rejects_inconsistent_values() {
        assert!(SearchConfig::builder().overfetch_factor(0).build().is_err());
        assert!(SearchConfig::builder().rerank_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn tie_break_uses_snake_case() {
        let value = serde_json::to_value(TieBreak::DocumentId).unwrap();
        assert_eq!(value, "document_id");
    }
}
