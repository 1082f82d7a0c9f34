//! Maps vector-index answers back to documents.

use std::sync::Arc;

use tracing::debug;

use crate::document::Candidate;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::mapping::PositionMap;
use crate::store::DocumentStore;

/// Turns a query vector into document-level candidates.
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    mapping: Arc<PositionMap>,
    store: Arc<DocumentStore>,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, mapping: Arc<PositionMap>, store: Arc<DocumentStore>) -> Self {
        Self { index, mapping, store }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Return up to `fetch_k` candidates in descending similarity order.
    ///
    /// Index slots that are [`NO_MATCH`](crate::index::NO_MATCH), have no
    /// mapping entry, or point at a document missing from the store are
    /// dropped; the result is then shorter than `fetch_k`. Requests larger
    /// than the index are served as a request for the whole index.
    pub fn retrieve(&self, query_vector: &[f32], fetch_k: usize) -> Result<Vec<Candidate>> {
        let hits = self.index.search(query_vector, fetch_k.min(self.index.len()))?;

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            if !hit.is_match() {
                continue;
            }
            let Some(id) = self.mapping.id_at(hit.position) else {
                debug!(position = hit.position, "index position has no mapping entry");
                continue;
            };
            let Some(document) = self.store.get(id) else {
                debug!(position = hit.position, id, "mapped document missing from store");
                continue;
            };
            candidates.push(Candidate {
                id: id.to_string(),
                document: Arc::clone(document),
                initial_score: hit.score,
                rerank_score: None,
                retrieval_rank: candidates.len(),
            });
        }

        Ok(candidates)
    }
}
