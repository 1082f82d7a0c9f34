//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use paperlens_rag::{ArtifactPaths, DEFAULT_BATCH_SIZE, TieBreak};
use paperlens_telemetry::LogFormat;

#[cfg(feature = "fastembed")]
const DEFAULT_EMBEDDER: &str = "fastembed";
#[cfg(not(feature = "fastembed"))]
const DEFAULT_EMBEDDER: &str = "openai";

#[cfg(feature = "fastembed")]
const DEFAULT_RERANKER: &str = "fastembed";
#[cfg(not(feature = "fastembed"))]
const DEFAULT_RERANKER: &str = "none";

#[derive(Parser, Debug)]
#[command(
    name = "paperlens",
    version,
    about = "Semantic search and summarization over research papers and technical blogs",
    long_about = "Prepare a corpus from fetched arXiv papers and blog posts, embed it into a \
                  vector index, then search it from the terminal or serve it over HTTP.

EXAMPLES:
  paperlens prepare --arxiv-dir data/raw/arxiv --blogs-dir data/raw/blogs/normalized
  paperlens build-index
  paperlens search \"sparse attention for long documents\" --top-k 10
  paperlens serve --port 8000"
)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, env = "PAPERLENS_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean fetched papers and blog posts into the JSONL corpus
    Prepare(PrepareArgs),
    /// Embed the corpus and write the vector index and position map
    BuildIndex(BuildIndexArgs),
    /// Search the index once, or interactively when no query is given
    Search(SearchArgs),
    /// Serve search, summarization and health over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Directory of arXiv `*.json` metadata with sibling `*.txt` text
    #[arg(long, env = "PAPERLENS_ARXIV_DIR", default_value = "data/raw/arxiv")]
    pub arxiv_dir: PathBuf,

    /// Directory of normalized `*_metadata.json` blog posts
    #[arg(long, env = "PAPERLENS_BLOGS_DIR", default_value = "data/raw/blogs/normalized")]
    pub blogs_dir: PathBuf,

    /// Corpus file to write
    #[arg(long, env = "PAPERLENS_CORPUS", default_value = "data/processed/processed_corpus.jsonl")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct BuildIndexArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    /// Documents embedded per backend call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text; starts an interactive session when omitted
    pub query: Option<String>,

    /// Number of results
    #[arg(long, short = 'k')]
    pub top_k: Option<i64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub models: ModelArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "PAPERLENS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PAPERLENS_PORT", default_value_t = 8000)]
    pub port: u16,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub models: ModelArgs,

    #[command(flatten)]
    pub summarizer: SummarizerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// JSONL corpus
    #[arg(long, env = "PAPERLENS_CORPUS", default_value = "data/processed/processed_corpus.jsonl")]
    pub corpus: PathBuf,

    /// Binary vector index
    #[arg(long, env = "PAPERLENS_INDEX", default_value = "data/embeddings/document_index.bin")]
    pub index: PathBuf,

    /// Index position to document id mapping
    #[arg(
        long,
        env = "PAPERLENS_MAPPING",
        default_value = "data/embeddings/index_to_id_mapping.json"
    )]
    pub mapping: PathBuf,
}

impl ArtifactArgs {
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            corpus: self.corpus.clone(),
            index: self.index.clone(),
            mapping: self.mapping.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderBackend {
    /// Local ONNX bi-encoder
    Fastembed,
    /// OpenAI-compatible embeddings API (`OPENAI_API_KEY`)
    Openai,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RerankerBackend {
    /// Local ONNX cross-encoder
    Fastembed,
    /// Rank by embedding similarity only
    None,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TieBreakArg {
    RetrievalOrder,
    DocumentId,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::RetrievalOrder => TieBreak::RetrievalOrder,
            TieBreakArg::DocumentId => TieBreak::DocumentId,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    #[arg(long, value_enum, env = "PAPERLENS_EMBEDDER", default_value = DEFAULT_EMBEDDER)]
    pub embedder: EmbedderBackend,

    /// Embedding model name (backend default when omitted)
    #[arg(long, env = "PAPERLENS_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Base URL of the OpenAI-compatible embeddings API
    #[arg(long, env = "PAPERLENS_OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Requested embedding size for models that support truncation
    #[arg(long, env = "PAPERLENS_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Where local models are downloaded
    #[arg(long, env = "PAPERLENS_MODEL_CACHE")]
    pub model_cache: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[arg(long, value_enum, env = "PAPERLENS_RERANKER", default_value = DEFAULT_RERANKER)]
    pub reranker: RerankerBackend,

    /// Cross-encoder model name (backend default when omitted)
    #[arg(long, env = "PAPERLENS_RERANK_MODEL")]
    pub rerank_model: Option<String>,

    /// Candidate pool multiplier when re-ranking
    #[arg(long, env = "PAPERLENS_OVERFETCH", default_value_t = 3)]
    pub overfetch_factor: usize,

    /// Result count when a request names none
    #[arg(long, env = "PAPERLENS_DEFAULT_TOP_K", default_value_t = 5)]
    pub default_top_k: usize,

    #[arg(long, value_enum, env = "PAPERLENS_TIE_BREAK", default_value = "retrieval-order")]
    pub tie_break: TieBreakArg,

    /// Query embedding bound, in milliseconds
    #[arg(long, env = "PAPERLENS_EMBED_TIMEOUT_MS", default_value_t = 10_000)]
    pub embed_timeout_ms: u64,

    /// Index scan bound, in milliseconds
    #[arg(long, env = "PAPERLENS_SEARCH_TIMEOUT_MS", default_value_t = 5_000)]
    pub search_timeout_ms: u64,

    /// Re-ranking bound, in milliseconds
    #[arg(long, env = "PAPERLENS_RERANK_TIMEOUT_MS", default_value_t = 30_000)]
    pub rerank_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizerArgs {
    /// Text-generation endpoint; summarization is disabled when unset
    #[arg(long, env = "PAPERLENS_SUMMARIZER_URL")]
    pub summarizer_url: Option<String>,

    /// Bearer token for the summarizer endpoint
    #[arg(long, env = "PAPERLENS_SUMMARIZER_TOKEN", hide_env_values = true)]
    pub summarizer_token: Option<String>,

    /// Per-call bound on the summarizer, in seconds
    #[arg(long, env = "PAPERLENS_SUMMARIZER_TIMEOUT_SECS", default_value_t = 120)]
    pub summarizer_timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_accepts_query_and_flags() {
        let cli = Cli::try_parse_from([
            "paperlens",
            "search",
            "graph neural networks",
            "--top-k",
            "7",
            "--reranker",
            "none",
            "--tie-break",
            "document-id",
        ])
        .unwrap();

        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query.as_deref(), Some("graph neural networks"));
        assert_eq!(args.top_k, Some(7));
        assert_eq!(args.models.reranker, RerankerBackend::None);
        assert_eq!(TieBreak::from(args.models.tie_break), TieBreak::DocumentId);
        assert_eq!(args.artifacts.paths(), ArtifactPaths::default());
    }

    #[test]
    fn build_index_defaults_batch_size() {
        let cli = Cli::try_parse_from(["paperlens", "build-index", "--embedder", "openai"]).unwrap();
        let Command::BuildIndex(args) = cli.command else {
            panic!("expected build-index");
        };
        assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(args.embedding.embedder, EmbedderBackend::Openai);
    }

    #[test]
    fn log_format_is_global() {
        let cli = Cli::try_parse_from(["paperlens", "serve", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
