//! Construction of models and services from command-line flags.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use paperlens_rag::{
    ArtifactPaths, Embedder, EmbeddingProvider, OpenAIEmbeddingProvider, Reranker, SearchConfig,
    SearchService, load_artifacts,
};
use paperlens_summary::{HttpGenerator, Summarizer, SummaryConfig};
use tracing::{info, warn};

use crate::args::{EmbedderBackend, EmbeddingArgs, ModelArgs, RerankerBackend, SummarizerArgs};

pub fn load_embedder(args: &EmbeddingArgs) -> Result<Embedder> {
    let provider: Arc<dyn EmbeddingProvider> = match args.embedder {
        EmbedderBackend::Fastembed => local_embedder(args)?,
        EmbedderBackend::Openai => {
            let mut provider = OpenAIEmbeddingProvider::from_env()
                .context("failed to configure the OpenAI embedder")?;
            if let Some(model) = &args.embedding_model {
                provider = provider.with_model(model);
            }
            if let Some(base_url) = &args.openai_base_url {
                provider = provider.with_base_url(base_url);
            }
            if let Some(dimensions) = args.embedding_dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Arc::new(provider)
        }
    };
    info!(model = provider.model_name(), dimensions = provider.dimensions(), "embedder ready");
    Ok(Embedder::new(provider))
}

#[cfg(feature = "fastembed")]
fn local_embedder(args: &EmbeddingArgs) -> Result<Arc<dyn EmbeddingProvider>> {
    use paperlens_rag::fastembed::{DEFAULT_EMBEDDING_MODEL, FastEmbedProvider};

    let model = args.embedding_model.as_deref().unwrap_or(DEFAULT_EMBEDDING_MODEL);
    let provider = FastEmbedProvider::new(model, args.model_cache.clone())
        .with_context(|| format!("failed to load embedding model '{model}'"))?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "fastembed"))]
fn local_embedder(_args: &EmbeddingArgs) -> Result<Arc<dyn EmbeddingProvider>> {
    anyhow::bail!("local embedding needs the `fastembed` feature; rebuild with it or pass --embedder openai")
}

/// Load the configured cross-encoder. `Ok(None)` means re-ranking was
/// switched off; an error means it was requested but could not be loaded.
pub fn load_reranker(args: &ModelArgs) -> Result<Option<Reranker>> {
    match args.reranker {
        RerankerBackend::None => Ok(None),
        RerankerBackend::Fastembed => local_reranker(args).map(Some),
    }
}

#[cfg(feature = "fastembed")]
fn local_reranker(args: &ModelArgs) -> Result<Reranker> {
    use paperlens_rag::CrossEncoderScorer;
    use paperlens_rag::fastembed::DEFAULT_RERANKER_MODEL;

    let model = args.rerank_model.as_deref().unwrap_or(DEFAULT_RERANKER_MODEL);
    let scorer = CrossEncoderScorer::new(model, args.embedding.model_cache.clone())
        .with_context(|| format!("failed to load re-rank model '{model}'"))?;
    Ok(Reranker::new(Arc::new(scorer)))
}

#[cfg(not(feature = "fastembed"))]
fn local_reranker(_args: &ModelArgs) -> Result<Reranker> {
    anyhow::bail!("cross-encoder re-ranking needs the `fastembed` feature")
}

pub fn search_config(args: &ModelArgs) -> Result<SearchConfig> {
    SearchConfig::builder()
        .default_top_k(args.default_top_k)
        .overfetch_factor(args.overfetch_factor)
        .tie_break(args.tie_break.into())
        .embed_timeout(Duration::from_millis(args.embed_timeout_ms))
        .search_timeout(Duration::from_millis(args.search_timeout_ms))
        .rerank_timeout(Duration::from_millis(args.rerank_timeout_ms))
        .build()
        .context("invalid search configuration")
}

/// A loaded search pipeline, plus why re-ranking is off when it was
/// requested but failed to load.
pub struct LoadedSearch {
    pub service: SearchService,
    pub reranker_error: Option<String>,
}

/// Load artifacts and models into a [`SearchService`].
///
/// The embedder and artifacts are mandatory. A re-ranker that fails to load
/// is logged and left out.
pub fn load_search(paths: &ArtifactPaths, args: &ModelArgs) -> Result<LoadedSearch> {
    let config = search_config(args)?;
    let embedder = load_embedder(&args.embedding)?;
    let retriever = load_artifacts(paths, &embedder).context("failed to load search artifacts")?;

    let (reranker, reranker_error) = match load_reranker(args) {
        Ok(reranker) => (reranker, None),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "re-ranker unavailable; results will not be re-ranked");
            (None, Some(format!("{e:#}")))
        }
    };

    let service = SearchService::builder()
        .config(config)
        .embedder(embedder)
        .retriever(retriever)
        .maybe_reranker(reranker)
        .build()?;
    Ok(LoadedSearch { service, reranker_error })
}

/// Build the summarizer client. `Ok(None)` when no endpoint is configured.
pub fn load_summarizer(args: &SummarizerArgs) -> Result<Option<Summarizer>> {
    let Some(url) = &args.summarizer_url else {
        return Ok(None);
    };
    let mut generator = HttpGenerator::new(url, Duration::from_secs(args.summarizer_timeout_secs))?;
    if let Some(token) = &args.summarizer_token {
        generator = generator.with_bearer_token(token);
    }
    info!(endpoint = %url, "summarizer configured");
    Ok(Some(Summarizer::new(Arc::new(generator), SummaryConfig::default())))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::args::{Cli, Command};

    fn model_args(extra: &[&str]) -> ModelArgs {
        let mut argv = vec!["paperlens", "search", "q", "--embedder", "openai"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Search(args) => args.models,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn search_config_follows_flags() {
        let config = search_config(&model_args(&[
            "--overfetch-factor",
            "5",
            "--rerank-timeout-ms",
            "250",
            "--default-top-k",
            "8",
        ]))
        .unwrap();
        assert_eq!(config.overfetch_factor, 5);
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.rerank_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_search_config_is_rejected() {
        assert!(search_config(&model_args(&["--overfetch-factor", "0"])).is_err());
    }

    #[test]
    fn reranker_can_be_switched_off() {
        assert!(load_reranker(&model_args(&["--reranker", "none"])).unwrap().is_none());
    }

    #[test]
    fn summarizer_is_optional() {
        let args = SummarizerArgs {
            summarizer_url: None,
            summarizer_token: None,
            summarizer_timeout_secs: 5,
        };
        assert!(load_summarizer(&args).unwrap().is_none());

        let args = SummarizerArgs {
            summarizer_url: Some("http://127.0.0.1:9/generate".into()),
            ..args
        };
        let summarizer = load_summarizer(&args).unwrap().unwrap();
        assert_eq!(summarizer.endpoint(), "http://127.0.0.1:9/generate");
    }
}
