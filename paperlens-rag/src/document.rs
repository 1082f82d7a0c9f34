//! Data types for corpus documents, retrieval candidates, and search hits.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

/// Abstracts shorter than this (in characters) are replaced by the start of
/// the full text when building the embedding text.
pub const MIN_ABSTRACT_CHARS: usize = 100;

/// Hard truncation boundary (in characters) for full-text fallback.
pub const FULL_TEXT_PREFIX_CHARS: usize = 500;

/// A processed paper or blog post.
///
/// Only `id` is required when reading a corpus line; every other field
/// defaults to empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Globally unique identifier (e.g. `arxiv_2401.01234`).
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Origin domain or site name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    /// Publication date exactly as fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    #[serde(default, rename = "abstract", deserialize_with = "null_as_default")]
    pub abstract_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_text: String,
}

/// Upstream JSON writes `null` for absent metadata; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Document {
    /// The text embedded for this document at index-build time.
    ///
    /// Title plus abstract; when the abstract is empty or shorter than
    /// [`MIN_ABSTRACT_CHARS`], the first [`FULL_TEXT_PREFIX_CHARS`] characters
    /// of the full text stand in for it.
    pub fn embedding_text(&self) -> String {
        let body = if self.abstract_text.chars().count() < MIN_ABSTRACT_CHARS {
            self.full_text.chars().take(FULL_TEXT_PREFIX_CHARS).collect::<String>()
        } else {
            self.abstract_text.clone()
        };
        format!("{}\n{}", self.title, body).trim().to_string()
    }

    /// The passage scored by the cross-encoder: `"{title}. {abstract}"`.
    pub fn rerank_text(&self) -> String {
        format!("{}. {}", self.title, self.abstract_text)
    }
}

/// A document retrieved for one request, with its scores.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub document: Arc<Document>,
    /// Inner-product similarity from the vector index.
    pub initial_score: f32,
    /// Cross-encoder score, set once re-ranking has run.
    pub rerank_score: Option<f32>,
    /// 0-based ordinal in retrieval order.
    pub retrieval_rank: usize,
}

impl Candidate {
    /// The score the candidate is ranked by: rerank score when present.
    pub fn final_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.initial_score)
    }
}

/// One entry of a search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub title: String,
    pub source: String,
    pub url: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl From<Candidate> for SearchHit {
    fn from(candidate: Candidate) -> Self {
        let score = candidate.final_score();
        let document = candidate.document;
        Self {
            id: candidate.id,
            score,
            title: document.title.clone(),
            source: document.source.clone(),
            url: document.url.clone(),
            abstract_text: document.abstract_text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, abstract_text: &str, full_text: &str) -> Document {
        Document {
            id: "d".into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            full_text: full_text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn embedding_text_prefers_long_abstract() {
        let abstract_text = "a".repeat(120);
        let d = doc("Title", &abstract_text, "full text that is ignored");
        assert_eq!(d.embedding_text(), format!("Title\n{abstract_text}"));
    }

    #[test]
    fn embedding_text_falls_back_to_truncated_full_text() {
        let full = "é".repeat(800);
        let d = doc("Title", "too short", &full);
        let text = d.embedding_text();
        assert_eq!(text, format!("Title\n{}", "é".repeat(FULL_TEXT_PREFIX_CHARS)));
    }

    #[test]
    fn embedding_text_is_trimmed_when_fields_are_empty() {
        let d = doc("", "", "");
        assert_eq!(d.embedding_text(), "");
        let d = doc("Only title", "", "");
        assert_eq!(d.embedding_text(), "Only title");
    }

    #[test]
    fn rerank_text_joins_with_period() {
        assert_eq!(doc("T", "A", "").rerank_text(), "T. A");
        assert_eq!(doc("", "", "").rerank_text(), ". ");
    }

    #[test]
    fn corpus_line_needs_only_an_id() {
        let d: Document = serde_json::from_str(r#"{"id":"x","abstract":"hello"}"#).unwrap();
        assert_eq!(d.id, "x");
        assert_eq!(d.abstract_text, "hello");
        assert!(d.authors.is_empty());
        assert!(d.published_date.is_none());
    }

    #[test]
    fn null_fields_read_as_empty() {
        let d: Document =
            serde_json::from_str(r#"{"id":"x","title":null,"authors":null,"abstract":null}"#)
                .unwrap();
        assert_eq!(d.title, "");
        assert!(d.authors.is_empty());
        assert_eq!(d.abstract_text, "");
    }
}
