//! Building and loading the three serving artifacts together.
//!
//! The corpus, the vector index and the position map are produced by one
//! build and must be loaded as a set. [`load_artifacts`] refuses any set
//! whose parts disagree with each other or with the running embedder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::mapping::PositionMap;
use crate::retriever::Retriever;
use crate::store::DocumentStore;

/// Default number of documents embedded per backend call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Locations of the serving artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub corpus: PathBuf,
    pub index: PathBuf,
    pub mapping: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("data/processed/processed_corpus.jsonl"),
            index: PathBuf::from("data/embeddings/document_index.bin"),
            mapping: PathBuf::from("data/embeddings/index_to_id_mapping.json"),
        }
    }
}

impl ArtifactPaths {
    /// All three artifacts under one directory, with the default file names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            corpus: dir.join("processed_corpus.jsonl"),
            index: dir.join("document_index.bin"),
            mapping: dir.join("index_to_id_mapping.json"),
        }
    }
}

/// Summary of an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub dimension: usize,
    pub model: String,
}

/// Embed every document of `store`, in corpus order, and write the index
/// and position map to `paths`.
///
/// Position *i* of the index holds the embedding of the *i*-th corpus
/// document and maps to its id.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] for an empty corpus or a zero batch
/// size, and propagates embedding and I/O errors.
pub async fn build_index(
    store: &DocumentStore,
    embedder: &Embedder,
    batch_size: usize,
    paths: &ArtifactPaths,
) -> Result<BuildReport> {
    if store.is_empty() {
        return Err(RagError::ConfigError("cannot build an index from an empty corpus".into()));
    }
    if batch_size == 0 {
        return Err(RagError::ConfigError("batch_size must be greater than zero".into()));
    }

    info!(documents = store.len(), model = embedder.model_name(), batch_size, "building index");
    let documents: Vec<_> = store.iter().collect();
    let mut vectors = Vec::with_capacity(documents.len());
    for (batch_number, batch) in documents.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|d| d.embedding_text()).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        vectors.extend(embedder.embed(&refs).await?);
        info!(batch = batch_number + 1, embedded = vectors.len(), "embedded batch");
    }

    let index = VectorIndex::build(&vectors)?.with_model(embedder.model_name());
    let mapping = PositionMap::from_ids(documents.iter().map(|d| d.id.clone()));

    index.save(&paths.index)?;
    mapping.save(&paths.mapping)?;

    Ok(BuildReport {
        documents: index.len(),
        dimension: index.dimension(),
        model: embedder.model_name().to_string(),
    })
}

/// Load the corpus, index and position map and check them against each
/// other and against `embedder`.
///
/// # Errors
///
/// Returns [`RagError::StartupFailure`] if any artifact is missing or
/// corrupt, or if:
/// - the index and mapping sizes differ
/// - a mapped id is absent from the corpus
/// - the corpus size differs from the index size
/// - the index dimension differs from the embedder's
/// - the index was built with a different embedding model
pub fn load_artifacts(paths: &ArtifactPaths, embedder: &Embedder) -> Result<Retriever> {
    let store = DocumentStore::load_jsonl(&paths.corpus)?;
    let index = VectorIndex::load(&paths.index)?;
    let mapping = PositionMap::load(&paths.mapping)?;

    check_consistency(&store, &index, &mapping, embedder)?;

    info!(
        documents = store.len(),
        dimension = index.dimension(),
        model = index.model().unwrap_or("unknown"),
        "artifacts loaded"
    );
    Ok(Retriever::new(Arc::new(index), Arc::new(mapping), Arc::new(store)))
}

fn check_consistency(
    store: &DocumentStore,
    index: &VectorIndex,
    mapping: &PositionMap,
    embedder: &Embedder,
) -> Result<()> {
    if index.len() != mapping.len() {
        return Err(RagError::startup(
            "artifacts",
            format!("index holds {} vectors but mapping has {} entries", index.len(), mapping.len()),
        ));
    }
    let mut seen = HashSet::with_capacity(mapping.len());
    if let Some((position, id)) = mapping.ids().enumerate().find(|(_, id)| !seen.insert(*id)) {
        return Err(RagError::startup(
            "artifacts",
            format!("document '{id}' is mapped twice (again at position {position})"),
        ));
    }
    if let Some((position, id)) = mapping.ids().enumerate().find(|(_, id)| !store.contains(id)) {
        return Err(RagError::startup(
            "artifacts",
            format!("mapping position {position} refers to '{id}', which is not in the corpus"),
        ));
    }
    if store.len() != index.len() {
        return Err(RagError::startup(
            "artifacts",
            format!("corpus has {} documents but index holds {} vectors", store.len(), index.len()),
        ));
    }
    if index.dimension() != embedder.dimensions() {
        return Err(RagError::startup(
            "artifacts",
            format!(
                "index dimension {} does not match embedder dimension {}",
                index.dimension(),
                embedder.dimensions()
            ),
        ));
    }
    if let Some(model) = index.model() {
        if model != embedder.model_name() {
            return Err(RagError::startup(
                "artifacts",
                format!(
                    "index was built with model '{model}' but the embedder is '{}'",
                    embedder.model_name()
                ),
            ));
        }
    }
    Ok(())
}
