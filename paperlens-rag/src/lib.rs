//! # paperlens-rag
//!
//! Semantic retrieval with optional cross-encoder re-ranking over a corpus
//! of research papers and technical blog posts.
//!
//! ## Overview
//!
//! A query flows through:
//!
//! 1. [`Embedder`] - maps the query to a unit-length vector
//! 2. [`VectorIndex`] - exact inner-product k-nearest-neighbor scan
//! 3. [`Retriever`] - resolves index positions to [`Document`]s via the
//!    [`PositionMap`] and [`DocumentStore`]
//! 4. [`Reranker`] - optional pairwise rescoring of an over-fetched pool
//! 5. [`SearchService`] - orders, truncates and shapes the final hits
//!
//! Offline, [`prepare_corpus`] cleans fetched material into the corpus and
//! [`build_index`] embeds it; [`load_artifacts`] loads the three artifacts
//! back with consistency checks.
//!
//! ## Features
//!
//! - `openai` (default) - [`OpenAIEmbeddingProvider`] for OpenAI-compatible
//!   embedding endpoints
//! - `fastembed` - local ONNX bi-encoder and cross-encoder models
//! - `full` - everything
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paperlens_rag::{ArtifactPaths, Embedder, SearchService, load_artifacts};
//!
//! let embedder = Embedder::new(provider);
//! let retriever = load_artifacts(&ArtifactPaths::default(), &embedder)?;
//! let service = SearchService::builder().embedder(embedder).retriever(retriever).build()?;
//! let response = service.search("sparse attention for long documents", 5).await?;
//! ```

pub mod artifacts;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod mapping;
pub mod reranker;
pub mod retriever;
pub mod search;
pub mod store;

#[cfg(feature = "fastembed")]
pub mod fastembed;
#[cfg(feature = "openai")]
pub mod openai;

pub use artifacts::{ArtifactPaths, BuildReport, DEFAULT_BATCH_SIZE, build_index, load_artifacts};
pub use config::{SearchConfig, SearchConfigBuilder, TieBreak};
pub use corpus::{PrepareStats, TextCleaner, prepare_corpus};
pub use document::{Candidate, Document, SearchHit};
pub use embedding::{Embedder, EmbeddingProvider};
pub use error::{RagError, Result};
pub use index::{IndexHit, NO_MATCH, VectorIndex, normalize_l2};
pub use mapping::PositionMap;
pub use reranker::{RelevanceScorer, Reranker};
pub use retriever::Retriever;
pub use search::{SearchResponse, SearchService, SearchServiceBuilder, order_candidates};
pub use store::DocumentStore;

#[cfg(feature = "fastembed")]
pub use self::fastembed::{CrossEncoderScorer, FastEmbedProvider};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
