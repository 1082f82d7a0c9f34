//! Building, loading and cross-checking the serving artifacts.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use paperlens_rag::{
    ArtifactPaths, Document, DocumentStore, Embedder, EmbeddingProvider, RagError, Result,
    SearchService, VectorIndex, build_index, load_artifacts,
};
use tempfile::TempDir;

/// Deterministic bag-of-letters embedding.
struct LetterEmbedder {
    dimensions: usize,
    model: &'static str,
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; self.dimensions];
        for byte in text.bytes().filter(u8::is_ascii_lowercase) {
            v[(byte - b'a') as usize % self.dimensions] += 1.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        self.model
    }
}

fn embedder(dimensions: usize, model: &'static str) -> Embedder {
    Embedder::new(Arc::new(LetterEmbedder { dimensions, model }))
}

fn corpus() -> Vec<Document> {
    [
        ("arxiv_1", "attention is all you need", "transformers replace recurrence"),
        ("arxiv_2", "dense passage retrieval", "dual encoders for open domain qa"),
        ("blog_1", "reranking with cross encoders", "pairwise scoring of passages"),
    ]
    .into_iter()
    .map(|(id, title, abstract_text)| Document {
        id: id.into(),
        title: title.into(),
        abstract_text: abstract_text.into(),
        ..Default::default()
    })
    .collect()
}

async fn built_artifacts() -> (TempDir, ArtifactPaths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    let documents = corpus();
    DocumentStore::write_jsonl(&paths.corpus, &documents).unwrap();
    let store = DocumentStore::load_jsonl(&paths.corpus).unwrap();

    let report = build_index(&store, &embedder(8, "letters"), 2, &paths).await.unwrap();
    assert_eq!(report.documents, 3);
    assert_eq!(report.dimension, 8);

    (dir, paths)
}

fn assert_startup_failure(result: Result<impl std::fmt::Debug>, needle: &str) {
    match result {
        Err(RagError::StartupFailure { message, .. }) => {
            assert!(message.contains(needle), "'{message}' does not mention '{needle}'")
        }
        other => panic!("expected a startup failure mentioning '{needle}', got {other:?}"),
    }
}

#[tokio::test]
async fn built_artifacts_load_and_serve() {
    let (_dir, paths) = built_artifacts().await;
    let embedder = embedder(8, "letters");

    let retriever = load_artifacts(&paths, &embedder).unwrap();
    assert_eq!(retriever.index().len(), 3);
    assert_eq!(retriever.index().model(), Some("letters"));

    let service = SearchService::builder().embedder(embedder).retriever(retriever).build().unwrap();
    let response = service.search("dense passage retrieval", 1).await.unwrap();
    assert_eq!(response.results[0].id, "arxiv_2");
}

#[tokio::test]
async fn index_positions_follow_corpus_order() {
    let (_dir, paths) = built_artifacts().await;
    let mapping = fs::read_to_string(&paths.mapping).unwrap();
    let mapping: serde_json::Value = serde_json::from_str(&mapping).unwrap();
    assert_eq!(mapping, serde_json::json!({"0": "arxiv_1", "1": "arxiv_2", "2": "blog_1"}));
}

#[tokio::test]
async fn reloaded_index_answers_identically() {
    let (_dir, paths) = built_artifacts().await;
    let index = VectorIndex::load(&paths.index).unwrap();
    let reloaded_path = paths.index.with_file_name("copy.bin");
    index.save(&reloaded_path).unwrap();
    let reloaded = VectorIndex::load(&reloaded_path).unwrap();

    let query = embedder(8, "letters").embed_query("cross encoders").await.unwrap();
    assert_eq!(index.search(&query, 5).unwrap(), reloaded.search(&query, 5).unwrap());
}

#[tokio::test]
async fn mapping_shorter_than_index_is_rejected() {
    let (_dir, paths) = built_artifacts().await;
    fs::write(&paths.mapping, r#"{"0": "arxiv_1", "1": "arxiv_2"}"#).unwrap();

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "letters")), "mapping has 2");
}

#[tokio::test]
async fn sparse_mapping_keys_are_rejected() {
    let (_dir, paths) = built_artifacts().await;
    fs::write(&paths.mapping, r#"{"0": "arxiv_1", "1": "arxiv_2", "3": "blog_1"}"#).unwrap();

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "letters")), "not dense");
}

#[tokio::test]
async fn document_mapped_twice_is_rejected() {
    let (_dir, paths) = built_artifacts().await;
    fs::write(&paths.mapping, r#"{"0": "arxiv_1", "1": "arxiv_1", "2": "blog_1"}"#).unwrap();

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "letters")), "mapped twice");
}

#[tokio::test]
async fn zero_padded_mapping_keys_are_rejected() {
    let (_dir, paths) = built_artifacts().await;
    fs::write(&paths.mapping, r#"{"0": "arxiv_1", "1": "arxiv_2", "01": "blog_1", "2": "blog_1"}"#)
        .unwrap();

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "letters")), "plain integer");
}

#[tokio::test]
async fn mapped_id_missing_from_corpus_is_rejected() {
    let (_dir, paths) = built_artifacts().await;
    fs::write(&paths.mapping, r#"{"0": "arxiv_1", "1": "arxiv_9", "2": "blog_1"}"#).unwrap();

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "letters")), "arxiv_9");
}

#[tokio::test]
async fn corpus_larger_than_index_is_rejected() {
    let (_dir, paths) = built_artifacts().await;
    let mut documents = corpus();
    documents.push(Document { id: "blog_2".into(), ..Default::default() });
    DocumentStore::write_jsonl(&paths.corpus, &documents).unwrap();

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "letters")), "corpus has 4");
}

#[tokio::test]
async fn embedder_dimension_mismatch_is_rejected() {
    let (_dir, paths) = built_artifacts().await;

    assert_startup_failure(load_artifacts(&paths, &embedder(16, "letters")), "dimension");
}

#[tokio::test]
async fn embedder_model_mismatch_is_rejected() {
    let (_dir, paths) = built_artifacts().await;

    assert_startup_failure(load_artifacts(&paths, &embedder(8, "other")), "model 'letters'");
}

#[tokio::test]
async fn corrupt_index_file_is_rejected() {
    let (_dir, paths) = built_artifacts().await;
    let bytes = fs::read(&paths.index).unwrap();
    fs::write(&paths.index, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(
        load_artifacts(&paths, &embedder(8, "letters")),
        Err(RagError::StartupFailure { .. })
    ));
}

#[tokio::test]
async fn missing_corpus_is_rejected() {
    let (_dir, paths) = built_artifacts().await;
    fs::remove_file(&paths.corpus).unwrap();

    assert!(matches!(
        load_artifacts(&paths, &embedder(8, "letters")),
        Err(RagError::StartupFailure { .. })
    ));
}

#[tokio::test]
async fn empty_corpus_cannot_be_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    let store = DocumentStore::from_documents(Vec::new()).unwrap();

    let err = build_index(&store, &embedder(8, "letters"), 4, &paths).await.unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}
