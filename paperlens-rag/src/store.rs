//! Document store backed by the line-delimited JSON corpus.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Read-only map from document ID to [`Document`].
///
/// Insertion order is remembered so the offline index build can assign
/// positions deterministically.
#[derive(Debug, Default)]
pub struct DocumentStore {
    by_id: HashMap<String, Arc<Document>>,
    order: Vec<String>,
}

impl DocumentStore {
    /// Build a store from documents. Duplicate IDs are rejected.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Result<Self> {
        let mut store = Self::default();
        for document in documents {
            store.insert(document)?;
        }
        Ok(store)
    }

    /// Load a JSONL corpus file, one document object per line.
    ///
    /// Blank lines are skipped. A malformed line, a missing `id`, or a
    /// duplicate ID is a startup failure naming the line number.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            RagError::startup("corpus", format!("cannot open {}: {e}", path.display()))
        })?;

        let mut store = Self::default();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document: Document = serde_json::from_str(&line).map_err(|e| {
                RagError::startup(
                    "corpus",
                    format!("{}:{}: invalid document: {e}", path.display(), line_no + 1),
                )
            })?;
            store.insert(document).map_err(|e| {
                RagError::startup("corpus", format!("{}:{}: {e}", path.display(), line_no + 1))
            })?;
        }

        info!(path = %path.display(), documents = store.len(), "loaded corpus");
        Ok(store)
    }

    /// Write documents as JSONL, in the given order.
    pub fn write_jsonl<'a>(
        path: impl AsRef<Path>,
        documents: impl IntoIterator<Item = &'a Document>,
    ) -> Result<usize> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        let mut count = 0;
        for document in documents {
            serde_json::to_writer(&mut writer, document)?;
            writer.write_all(b"\n")?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    }

    fn insert(&mut self, document: Document) -> Result<()> {
        if document.id.is_empty() {
            return Err(RagError::ConfigError("document id must not be empty".to_string()));
        }
        if self.by_id.contains_key(&document.id) {
            return Err(RagError::ConfigError(format!("duplicate document id '{}'", document.id)));
        }
        self.order.push(document.id.clone());
        self.by_id.insert(document.id.clone(), Arc::new(document));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Document>> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document { id: id.into(), title: format!("Title {id}"), ..Default::default() }
    }

    #[test]
    fn jsonl_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus/processed.jsonl");
        let docs = vec![doc("c"), doc("a"), doc("b")];

        let written = DocumentStore::write_jsonl(&path, &docs).unwrap();
        assert_eq!(written, 3);

        let store = DocumentStore::load_jsonl(&path).unwrap();
        let ids: Vec<&str> = store.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(store.get("a").unwrap().title, "Title a");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = DocumentStore::from_documents(vec![doc("a"), doc("a")]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn malformed_line_is_a_startup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, "{\"id\":\"a\"}\n\nnot json\n").unwrap();

        let err = DocumentStore::load_jsonl(&path).unwrap_err();
        match err {
            RagError::StartupFailure { component, message } => {
                assert_eq!(component, "corpus");
                assert!(message.contains(":3:"), "unexpected message: {message}");
            }
            other => panic!("expected StartupFailure, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_startup_failure() {
        let err = DocumentStore::load_jsonl("/nonexistent/corpus.jsonl").unwrap_err();
        assert!(matches!(err, RagError::StartupFailure { .. }));
    }
}
