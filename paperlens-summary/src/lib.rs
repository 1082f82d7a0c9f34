//! # paperlens-summary
//!
//! Map-reduce summarization of retrieved articles.
//!
//! The model itself is external: a [`TextGenerator`] sends prompts to a
//! text-to-text service, and [`HttpGenerator`] speaks the HuggingFace
//! inference protocol.
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use paperlens_summary::{HttpGenerator, Summarizer, SummaryConfig};
//!
//! let generator = HttpGenerator::new("http://localhost:8080/generate", Duration::from_secs(60))?;
//! let summarizer = Summarizer::new(Arc::new(generator), SummaryConfig::default());
//! let report = summarizer.summarize_articles(&articles).await?;
//! ```

pub mod error;
pub mod generator;
pub mod summarizer;

pub use error::{Result, SummaryError};
pub use generator::{GenerationParams, HttpGenerator, TextGenerator};
pub use summarizer::{
    Article, ArticleSummary, PROMPT_PREFIX, SYNTHESIS_INSTRUCTION, Summarizer, SummaryConfig,
    SummaryConfigBuilder, SummaryReport,
};
