//! Core data types used throughout wikidex.
//!
//! These types represent the pages, chunks, and retrieval results that flow
//! through the ingestion and query pipelines.

use serde::Serialize;

/// Raw page as returned by the wiki, markup intact.
#[derive(Debug, Clone)]
pub struct Page {
    /// Stable, source-assigned page identifier.
    pub id: String,
    pub title: String,
    /// Page body in the source's storage markup.
    pub body: String,
}

/// Deterministic derivation of a [`Page`]: cleaned text plus its word-window
/// chunks. One page yields one processed page yields N chunks.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub page_id: String,
    pub title: String,
    pub cleaned_text: String,
    pub chunks: Vec<String>,
}

/// Metadata attached to every chunk handed to the similarity store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChunkMeta {
    pub page_id: String,
    pub title: String,
}

/// A similarity hit returned by the store, highest score first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub meta: ChunkMeta,
    pub score: f32,
}

/// One fused retrieval result: either an embedding hit or a pattern
/// extraction over embedding-hit text.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievedItem {
    pub text: String,
    pub meta: ResultMeta,
}

/// Tagged result metadata. Serialized untagged so embedding hits carry a
/// `score` key and extractions carry a `type` key, nothing more.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResultMeta {
    Embedding {
        score: f32,
        page_id: String,
        title: String,
    },
    Extraction {
        #[serde(rename = "type")]
        kind: ExtractionKind,
    },
}

/// The deterministic extractors the retriever can run over hit text.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ExtractionKind {
    #[serde(rename = "url_extraction")]
    Url,
    #[serde(rename = "phone_extraction")]
    Phone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_meta_serializes_with_score() {
        let meta = ResultMeta::Embedding {
            score: 0.75,
            page_id: "42".to_string(),
            title: "Runbook".to_string(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["score"], 0.75);
        assert_eq!(json["page_id"], "42");
        assert!(json.get("type").is_none());
    }

    #[test]
    fn test_extraction_meta_serializes_with_type() {
        let url = ResultMeta::Extraction {
            kind: ExtractionKind::Url,
        };
        let phone = ResultMeta::Extraction {
            kind: ExtractionKind::Phone,
        };
        assert_eq!(
            serde_json::to_value(&url).unwrap()["type"],
            "url_extraction"
        );
        assert_eq!(
            serde_json::to_value(&phone).unwrap()["type"],
            "phone_extraction"
        );
    }
}
