//! Flat inner-product vector index with binary persistence.
//!
//! [`VectorIndex`] stores one L2-normalized embedding per document in a
//! contiguous buffer and answers exact k-nearest-neighbor queries by scanning
//! every vector. On normalized vectors the inner product equals cosine
//! similarity.

use std::fs;
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RagError, Result};

/// Position reported for a result slot that has no backing vector.
///
/// Returned when the index holds fewer than `k` vectors; callers must filter
/// these entries out rather than treat them as matches.
pub const NO_MATCH: i64 = -1;

const MAGIC: [u8; 8] = *b"PLVIDX\0\0";
const FORMAT_VERSION: u32 = 1;

/// One slot of a k-nearest-neighbor answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Index position, or [`NO_MATCH`].
    pub position: i64,
    pub score: f32,
}

impl IndexHit {
    pub fn is_match(&self) -> bool {
        self.position != NO_MATCH
    }
}

/// An exact inner-product index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    /// Name of the embedding model the vectors came from, if recorded.
    model: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 8],
    format_version: u32,
    model: Option<String>,
    dimension: u64,
    count: u64,
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// An index with no vectors.
    pub fn empty(dimension: usize) -> Self {
        Self { dimension, vectors: Vec::new(), model: None }
    }

    /// Build an index over `vectors`, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the input is empty (use
    /// [`VectorIndex::empty`]), a vector has zero length, or any vector's
    /// dimension disagrees with the first.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let first = vectors.first().ok_or_else(|| {
            RagError::IndexError("cannot infer dimension from an empty vector set".to_string())
        })?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(RagError::IndexError("vectors must have at least one dimension".into()));
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(RagError::IndexError(format!(
                    "vector {position} has dimension {} but the index dimension is {dimension}",
                    vector.len()
                )));
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, vectors: data, model: None })
    }

    /// Record the embedding model the vectors were produced with.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 { 0 } else { self.vectors.len() / self.dimension }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Return the `k` most similar positions to `query`, best first.
    ///
    /// Ties are ordered by ascending position. The answer always has exactly
    /// `k` slots; slots beyond the number of stored vectors are
    /// [`NO_MATCH`] with a score of negative infinity.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dimension {
            return Err(RagError::IndexError(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<IndexHit> = if self.is_empty() {
            Vec::new()
        } else {
            self.vectors
                .chunks_exact(self.dimension)
                .enumerate()
                .map(|(position, vector)| IndexHit {
                    position: position as i64,
                    score: inner_product(vector, query),
                })
                .collect()
        };

        let by_score = |a: &IndexHit, b: &IndexHit| {
            b.score.total_cmp(&a.score).then_with(|| a.position.cmp(&b.position))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k, by_score);
            scored.truncate(k);
        }
        scored.sort_by(by_score);

        let matched = scored.len();
        scored.resize(k, IndexHit { position: NO_MATCH, score: f32::NEG_INFINITY });
        debug!(k, matched, "index search");
        Ok(scored)
    }

    /// Serialize the index to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = IndexFile {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dimension: self.dimension as u64,
            count: self.len() as u64,
            vectors: self.vectors.clone(),
        };
        let bytes = bincode::DefaultOptions::new()
            .serialize(&file)
            .map_err(|e| RagError::IndexError(format!("failed to encode index: {e}")))?;
        fs::write(path, bytes)?;
        info!(path = %path.display(), vectors = self.len(), dimension = self.dimension, "saved index");
        Ok(())
    }

    /// Load an index written by [`VectorIndex::save`].
    ///
    /// # Errors
    ///
    /// Every failure (missing file, bad header, truncated or inconsistent
    /// payload) is a [`RagError::StartupFailure`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let corrupt = |message: String| {
            RagError::startup("index", format!("{}: {message}", path.display()))
        };

        let bytes = fs::read(path).map_err(|e| corrupt(format!("cannot read: {e}")))?;
        let file: IndexFile = bincode::DefaultOptions::new()
            .with_limit(bytes.len() as u64)
            .deserialize(&bytes)
            .map_err(|e| corrupt(format!("corrupt index file: {e}")))?;

        if file.magic != MAGIC {
            return Err(corrupt("not a vector index file".to_string()));
        }
        if file.format_version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", file.format_version)));
        }
        let dimension = usize::try_from(file.dimension)
            .map_err(|_| corrupt("dimension out of range".to_string()))?;
        if dimension == 0 {
            return Err(corrupt("dimension must be positive".to_string()));
        }
        let expected = file.count.checked_mul(file.dimension);
        if expected != Some(file.vectors.len() as u64) {
            return Err(corrupt(format!(
                "expected {} x {} values, found {}",
                file.count,
                file.dimension,
                file.vectors.len()
            )));
        }

        info!(path = %path.display(), vectors = file.count, dimension, "loaded index");
        Ok(Self { dimension, vectors: file.vectors, model: file.model })
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `vector` to unit L2 norm in place. Zero vectors are left unchanged.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
