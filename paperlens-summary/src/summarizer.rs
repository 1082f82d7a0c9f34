//! Map-reduce summarization over a [`TextGenerator`].
//!
//! Each article is summarized on its own (map), then the per-article
//! summaries are synthesized into one overview (reduce).

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SummaryError};
use crate::generator::{GenerationParams, TextGenerator};

/// Instruction prepended to every generator prompt.
pub const PROMPT_PREFIX: &str = "Summarize the following technical article concisely:\n\n";

/// Instruction introducing the combined per-article summaries.
pub const SYNTHESIS_INSTRUCTION: &str =
    "Synthesize these summaries into a single coherent technical overview:\n\n";

/// An article to summarize, usually a search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, rename = "abstract", deserialize_with = "null_as_empty")]
    pub abstract_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
}

/// Clients forward search hits verbatim; a `null` field reads as empty.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The summary of one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub url: String,
}

/// Per-article summaries plus the synthesized overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub individual_summaries: Vec<ArticleSummary>,
    pub global_summary: String,
    pub total_articles: usize,
}

/// Configuration for the [`Summarizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryConfig {
    pub article_params: GenerationParams,
    pub synthesis_params: GenerationParams,
    /// Largest number of articles accepted in one request.
    pub max_articles: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            article_params: GenerationParams::article(),
            synthesis_params: GenerationParams::synthesis(),
            max_articles: 20,
        }
    }
}

impl SummaryConfig {
    pub fn builder() -> SummaryConfigBuilder {
        SummaryConfigBuilder::default()
    }
}

/// Builder for a validated [`SummaryConfig`].
#[derive(Debug, Clone, Default)]
pub struct SummaryConfigBuilder {
    config: SummaryConfig,
}

impl SummaryConfigBuilder {
    pub fn article_params(mut self, params: GenerationParams) -> Self {
        self.config.article_params = params;
        self
    }

    pub fn synthesis_params(mut self, params: GenerationParams) -> Self {
        self.config.synthesis_params = params;
        self
    }

    pub fn max_articles(mut self, max: usize) -> Self {
        self.config.max_articles = max;
        self
    }

    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidRequest`] if `max_articles` is zero or
    /// any parameter set has `min_length > max_length` or zero beams.
    pub fn build(self) -> Result<SummaryConfig> {
        let config = self.config;
        if config.max_articles == 0 {
            return Err(SummaryError::InvalidRequest("max_articles must be at least 1".into()));
        }
        for (name, params) in
            [("article", &config.article_params), ("synthesis", &config.synthesis_params)]
        {
            if params.min_length > params.max_length {
                return Err(SummaryError::InvalidRequest(format!(
                    "{name} min_length ({}) exceeds max_length ({})",
                    params.min_length, params.max_length
                )));
            }
            if params.num_beams == 0 {
                return Err(SummaryError::InvalidRequest(format!("{name} num_beams must be positive")));
            }
        }
        Ok(config)
    }
}

/// Summarizes article sets through a shared [`TextGenerator`].
#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    config: SummaryConfig,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("endpoint", &self.generator.endpoint())
            .field("config", &self.config)
            .finish()
    }
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: SummaryConfig) -> Self {
        Self { generator, config }
    }

    pub fn endpoint(&self) -> &str {
        self.generator.endpoint()
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Summarize one article from its title and abstract.
    pub async fn summarize_article(&self, article: &Article) -> Result<String> {
        let text = format!("Title: {}\nContent: {}", article.title, article.abstract_text);
        self.generate(&text, &self.config.article_params).await
    }

    /// Summarize every article in order, then synthesize the results.
    ///
    /// Issues one generator call per article followed by one synthesis call.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidRequest`] for an empty list or one
    /// longer than `max_articles`; generator errors abort the whole request.
    pub async fn summarize_articles(&self, articles: &[Article]) -> Result<SummaryReport> {
        if articles.is_empty() {
            return Err(SummaryError::InvalidRequest("at least one article is required".into()));
        }
        if articles.len() > self.config.max_articles {
            return Err(SummaryError::InvalidRequest(format!(
                "{} articles exceed the maximum of {}",
                articles.len(),
                self.config.max_articles
            )));
        }

        let mut individual_summaries = Vec::with_capacity(articles.len());
        for (i, article) in articles.iter().enumerate() {
            let summary = self.summarize_article(article).await?;
            debug!(article = i + 1, title = %article.title, "article summarized");
            individual_summaries.push(ArticleSummary {
                title: article.title.clone(),
                summary,
                source: article.source.clone(),
                url: article.url.clone(),
            });
        }

        let combined = individual_summaries
            .iter()
            .enumerate()
            .map(|(i, s)| format!("Source {}: {}", i + 1, s.summary))
            .collect::<Vec<_>>()
            .join(" ");
        let global_summary = self
            .generate(&format!("{SYNTHESIS_INSTRUCTION}{combined}"), &self.config.synthesis_params)
            .await?;

        info!(total_articles = articles.len(), "summary report produced");
        Ok(SummaryReport { individual_summaries, global_summary, total_articles: articles.len() })
    }

    async fn generate(&self, text: &str, params: &GenerationParams) -> Result<String> {
        let prompt = format!("{PROMPT_PREFIX}{text}");
        let output = self.generator.generate(&prompt, params).await?;
        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_fields_accept_null_and_missing() {
        let article: Article =
            serde_json::from_str(r#"{"title": null, "abstract": "text", "url": null}"#).unwrap();
        assert_eq!(article.title, "");
        assert_eq!(article.abstract_text, "text");
        assert_eq!(article.source, "");
        assert_eq!(article.url, "");
    }

    #[test]
    fn config_rejects_inverted_lengths() {
        let params = GenerationParams { min_length: 300, ..GenerationParams::article() };
        assert!(SummaryConfig::builder().article_params(params).build().is_err());
        assert!(SummaryConfig::builder().max_articles(0).build().is_err());
        assert!(SummaryConfig::builder().build().is_ok());
    }

    #[test]
    fn article_reads_abstract_key() {
        let article: Article =
            serde_json::from_str(r#"{"title":"T","abstract":"A","url":"u"}"#).unwrap();
        assert_eq!(article.abstract_text, "A");
        assert_eq!(article.source, "");
    }
}
