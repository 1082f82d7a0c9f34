//! Offline corpus preparation.
//!
//! Turns already-fetched material into [`Document`]s:
//!
//! - arXiv papers: a `<name>.json` metadata file with the extracted text in a
//!   sibling `<name>.txt`.
//! - Blog posts: `<name>_metadata.json` files carrying their own raw text.
//!
//! Fetching and PDF text extraction happen elsewhere.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Title used when the metadata has none.
pub const UNTITLED: &str = "Untitled";

/// Aggregate file written by the blog normalizer; not a post.
const BLOG_AGGREGATE_FILE: &str = "all_blogs_metadata.json";

/// Whitespace normalization applied to extracted text.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    blank_lines: Regex,
    whitespace_runs: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RagError::ConfigError(format!("invalid cleaning pattern: {e}")))
        };
        Ok(Self { blank_lines: compile(r"\n\s*\n")?, whitespace_runs: compile(r"\s{2,}")? })
    }

    /// Collapse blank-line runs, squeeze whitespace runs to one space, then
    /// trim every line and the whole text.
    ///
    /// A run of two or more whitespace characters, including a blank line,
    /// becomes a single space; lone newlines survive.
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = self.blank_lines.replace_all(text, "\n\n");
        let text = self.whitespace_runs.replace_all(&text, " ");
        text.split('\n').map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ArxivMetadata {
    paper_id: String,
    title: Option<String>,
    authors: Option<Vec<String>>,
    summary: Option<String>,
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlogMetadata {
    id: Option<String>,
    source: Option<String>,
    url: Option<String>,
    title: Option<String>,
    date: Option<String>,
    authors: Option<Vec<String>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    first_paragraph: Option<String>,
    raw_text: Option<String>,
}

/// Counts reported by [`prepare_corpus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareStats {
    pub arxiv: usize,
    pub blogs: usize,
    pub skipped: usize,
}

/// Build the corpus from an arXiv directory and a normalized-blogs
/// directory. Either directory may be absent.
///
/// arXiv documents come first, then blog posts, each group in file-name
/// order, so index positions are reproducible. Files that cannot be read
/// or parsed, papers without extracted text, and repeated ids are skipped
/// with a warning.
pub fn prepare_corpus(
    arxiv_dir: impl AsRef<Path>,
    blogs_dir: impl AsRef<Path>,
) -> Result<(Vec<Document>, PrepareStats)> {
    let cleaner = TextCleaner::new()?;
    let mut stats = PrepareStats::default();
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for path in list_files(arxiv_dir.as_ref(), |name| name.ends_with(".json")) {
        match read_arxiv(&path, &cleaner) {
            Ok(doc) if seen.insert(doc.id.clone()) => {
                stats.arxiv += 1;
                documents.push(doc);
            }
            Ok(doc) => {
                warn!(path = %path.display(), id = %doc.id, "duplicate document id, skipped");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "arxiv paper skipped");
                stats.skipped += 1;
            }
        }
    }

    let is_post = |name: &str| name.ends_with("_metadata.json") && name != BLOG_AGGREGATE_FILE;
    for path in list_files(blogs_dir.as_ref(), is_post) {
        match read_blog(&path, &cleaner) {
            Ok(doc) if seen.insert(doc.id.clone()) => {
                stats.blogs += 1;
                documents.push(doc);
            }
            Ok(doc) => {
                warn!(path = %path.display(), id = %doc.id, "duplicate document id, skipped");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "blog post skipped");
                stats.skipped += 1;
            }
        }
    }

    info!(arxiv = stats.arxiv, blogs = stats.blogs, skipped = stats.skipped, "corpus prepared");
    Ok((documents, stats))
}

fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "directory not found, skipped");
        return Vec::new();
    }

    let mut files = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str().is_some_and(&keep))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    files
}

fn read_arxiv(path: &Path, cleaner: &TextCleaner) -> Result<Document> {
    let metadata: ArxivMetadata = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let text_path = path.with_extension("txt");
    let full_text = std::fs::read_to_string(&text_path).map_err(|e| {
        RagError::ConfigError(format!("extracted text {} unavailable: {e}", text_path.display()))
    })?;

    Ok(Document {
        id: format!("arxiv_{}", metadata.paper_id),
        title: metadata.title.unwrap_or_else(|| UNTITLED.to_string()),
        source: "arxiv.org".to_string(),
        url: format!("https://arxiv.org/abs/{}", metadata.paper_id),
        published_date: metadata.published_date,
        authors: metadata.authors.unwrap_or_default(),
        abstract_text: metadata.summary.unwrap_or_default(),
        full_text: cleaner.clean(&full_text),
    })
}

fn read_blog(path: &Path, cleaner: &TextCleaner) -> Result<Document> {
    let metadata: BlogMetadata = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let id = metadata
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RagError::ConfigError("blog metadata has no id".to_string()))?;

    Ok(Document {
        id,
        title: metadata.title.unwrap_or_else(|| UNTITLED.to_string()),
        source: metadata.source.unwrap_or_default(),
        url: metadata.url.unwrap_or_default(),
        published_date: metadata.date,
        authors: metadata.authors.unwrap_or_default(),
        abstract_text: metadata.abstract_text.or(metadata.first_paragraph).unwrap_or_default(),
        full_text: cleaner.clean(metadata.raw_text.as_deref().unwrap_or_default()),
    })
}
