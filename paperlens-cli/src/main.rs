//! `paperlens`: prepare the corpus, build the index, search it, serve it.

mod args;
mod components;
mod repl;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use paperlens_rag::{DocumentStore, build_index, prepare_corpus};
use paperlens_server::{AppState, SearchContext, ServerConfig, run_server, shutdown_signal};
use tracing::{info, warn};

use crate::args::{BuildIndexArgs, Cli, Command, PrepareArgs, SearchArgs, ServeArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; flags and the real environment still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    paperlens_telemetry::init_telemetry(cli.log_format).context("failed to initialize logging")?;

    match cli.command {
        Command::Prepare(args) => prepare(args),
        Command::BuildIndex(args) => build(args).await,
        Command::Search(args) => search(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

fn prepare(args: PrepareArgs) -> Result<()> {
    let (documents, stats) = prepare_corpus(&args.arxiv_dir, &args.blogs_dir)?;
    if documents.is_empty() {
        warn!(
            arxiv_dir = %args.arxiv_dir.display(),
            blogs_dir = %args.blogs_dir.display(),
            "no documents found"
        );
    }
    let written = DocumentStore::write_jsonl(&args.output, &documents)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(
        written,
        arxiv = stats.arxiv,
        blogs = stats.blogs,
        skipped = stats.skipped,
        output = %args.output.display(),
        "corpus prepared"
    );
    Ok(())
}

async fn build(args: BuildIndexArgs) -> Result<()> {
    let paths = args.artifacts.paths();
    let store = DocumentStore::load_jsonl(&paths.corpus)?;
    let embedder = components::load_embedder(&args.embedding)?;

    let started = Instant::now();
    let report = build_index(&store, &embedder, args.batch_size, &paths).await?;
    info!(
        documents = report.documents,
        dimension = report.dimension,
        model = %report.model,
        elapsed_ms = started.elapsed().as_millis() as u64,
        index = %paths.index.display(),
        mapping = %paths.mapping.display(),
        "index built"
    );
    Ok(())
}

async fn search(args: SearchArgs) -> Result<()> {
    let loaded = components::load_search(&args.artifacts.paths(), &args.models)?;
    let service = loaded.service;
    let top_k = args.top_k.unwrap_or(service.config().default_top_k as i64);

    match args.query {
        Some(query) => {
            let response = service.search(&query, top_k).await?;
            repl::print_response(&response, args.json)
        }
        None => repl::run_interactive(&service, top_k, args.json).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let loaded = components::load_search(&args.artifacts.paths(), &args.models)?;

    let mut context = SearchContext::new(loaded.service);
    if let Some(reason) = loaded.reranker_error {
        context = context.with_reranker_error(reason);
    }
    context = match components::load_summarizer(&args.summarizer) {
        Ok(summarizer) => context.with_summarizer(summarizer),
        Err(e) => {
            warn!(error = %e, "summarizer unavailable; /summarize will return 503");
            context.with_summarizer_error(e.to_string())
        }
    };

    let health = context.health();
    info!(status = ?health.status, "components loaded");

    let config = ServerConfig { host: args.host, port: args.port };
    run_server(config, AppState::new(context), shutdown_signal()).await
}
