//! Hybrid retrieval: semantic similarity plus intent-driven extraction.
//!
//! Every query runs an embedding-similarity search. When the query's wording
//! signals URL or phone-number intent, the matching extractor runs over the
//! text of the embedding hits (never the query itself) and its distinct
//! matches are appended after the embedding results. The fusion order is
//! fixed: embedding hits, then URL extractions, then phone extractions, with
//! no deduplication across categories.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::extract::{extract_phone_numbers, extract_urls};
use crate::models::{ExtractionKind, ResultMeta, RetrievedItem, ScoredChunk};
use crate::store::SimilarityStore;

const URL_KEYWORDS: [&str; 4] = ["url", "link", "website", "endpoint"];
const PHONE_KEYWORDS: [&str; 4] = ["phone", "contact number", "telephone", "contact"];

/// Does the query ask about URLs?
pub fn is_url_query(query: &str) -> bool {
    let query = query.to_lowercase();
    URL_KEYWORDS.iter().any(|k| query.contains(k))
}

/// Does the query ask about phone numbers?
pub fn is_phone_query(query: &str) -> bool {
    let query = query.to_lowercase();
    PHONE_KEYWORDS.iter().any(|k| query.contains(k))
}

pub struct HybridRetriever {
    store: Arc<dyn SimilarityStore>,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn SimilarityStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    /// Retrieve fused context for `query`.
    ///
    /// Never fails: a store with no relevant content (or a failing backend)
    /// yields an empty sequence, and extraction over an empty hit set yields
    /// nothing.
    pub async fn retrieve(&self, query: &str) -> Vec<RetrievedItem> {
        info!(%query, "retrieving context");

        let hits = self.store.query(query, self.top_k).await;
        debug!(hits = hits.len(), "embedding hits");

        let mut results: Vec<RetrievedItem> = hits
            .iter()
            .map(|hit| RetrievedItem {
                text: hit.text.clone(),
                meta: ResultMeta::Embedding {
                    score: hit.score,
                    page_id: hit.meta.page_id.clone(),
                    title: hit.meta.title.clone(),
                },
            })
            .collect();

        if is_url_query(query) {
            let urls = distinct_matches(&hits, extract_urls);
            info!(count = urls.len(), "extracted urls");
            results.extend(urls.into_iter().map(|url| RetrievedItem {
                text: url,
                meta: ResultMeta::Extraction {
                    kind: ExtractionKind::Url,
                },
            }));
        }

        if is_phone_query(query) {
            let phones = distinct_matches(&hits, extract_phone_numbers);
            info!(count = phones.len(), "extracted phone numbers");
            results.extend(phones.into_iter().map(|phone| RetrievedItem {
                text: phone,
                meta: ResultMeta::Extraction {
                    kind: ExtractionKind::Phone,
                },
            }));
        }

        results
    }
}

/// Run `extract` over every hit and keep distinct matches, first-seen order.
fn distinct_matches(hits: &[ScoredChunk], extract: fn(&str) -> Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut matches = Vec::new();
    for hit in hits {
        for m in extract(&hit.text) {
            if seen.insert(m.clone()) {
                matches.push(m);
            }
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMeta;
    use crate::store::StoreError;
    use async_trait::async_trait;

    /// Store stub returning a fixed hit list.
    struct FixedStore {
        hits: Vec<ScoredChunk>,
    }

    #[async_trait]
    impl SimilarityStore for FixedStore {
        async fn add(&self, _: Vec<String>, _: Vec<ChunkMeta>) -> Result<(), StoreError> {
            Ok(())
        }
        async fn query(&self, _text: &str, k: usize) -> Vec<ScoredChunk> {
            self.hits.iter().take(k).cloned().collect()
        }
        async fn delete_by_page(&self, _page_id: &str) {}
    }

    fn hit(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            text: text.to_string(),
            meta: ChunkMeta {
                page_id: "10".to_string(),
                title: "API docs".to_string(),
            },
            score,
        }
    }

    fn retriever(hits: Vec<ScoredChunk>) -> HybridRetriever {
        HybridRetriever::new(Arc::new(FixedStore { hits }), 5)
    }

    #[test]
    fn test_intent_classification() {
        assert!(is_url_query("what is the LINK to the portal?"));
        assert!(is_url_query("give me the api endpoint"));
        assert!(!is_url_query("how do I reset my password"));

        assert!(is_phone_query("what's the support contact?"));
        assert!(is_phone_query("Telephone for ops?"));
        assert!(!is_phone_query("where is the office"));
    }

    #[tokio::test]
    async fn test_embedding_results_precede_url_extractions() {
        let r = retriever(vec![hit("see https://portal.example.com for access", 0.91)]);
        let results = r.retrieve("what is the link to the portal?").await;

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0].meta,
            ResultMeta::Embedding { score, .. } if (score - 0.91).abs() < 1e-6
        ));
        assert_eq!(results[1].text, "https://portal.example.com");
        assert_eq!(
            results[1].meta,
            ResultMeta::Extraction {
                kind: ExtractionKind::Url
            }
        );
    }

    #[tokio::test]
    async fn test_no_extraction_without_intent() {
        let r = retriever(vec![hit("see https://portal.example.com for access", 0.8)]);
        let results = r.retrieve("how do I get portal access?").await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].meta, ResultMeta::Embedding { .. }));
    }

    #[tokio::test]
    async fn test_both_intents_fuse_urls_before_phones() {
        let r = retriever(vec![hit(
            "support: https://help.example.com or +1 555 123 4567",
            0.7,
        )]);
        let results = r
            .retrieve("what's the website and phone for support?")
            .await;

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].meta, ResultMeta::Embedding { .. }));
        assert_eq!(
            results[1].meta,
            ResultMeta::Extraction {
                kind: ExtractionKind::Url
            }
        );
        assert_eq!(
            results[2].meta,
            ResultMeta::Extraction {
                kind: ExtractionKind::Phone
            }
        );
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_results() {
        let r = retriever(Vec::new());
        assert!(r.retrieve("link to anything?").await.is_empty());
        assert!(r.retrieve("phone contact?").await.is_empty());
        assert!(r.retrieve("plain question").await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_urls_collapse_within_category() {
        let r = retriever(vec![
            hit("primary: https://portal.example.com", 0.9),
            hit("again https://portal.example.com and https://docs.example.com", 0.5),
        ]);
        let results = r.retrieve("url please").await;

        let urls: Vec<&str> = results
            .iter()
            .filter(|i| matches!(i.meta, ResultMeta::Extraction { .. }))
            .map(|i| i.text.as_str())
            .collect();
        assert_eq!(urls, vec!["https://portal.example.com", "https://docs.example.com"]);
    }

    #[tokio::test]
    async fn test_extraction_may_repeat_embedding_text() {
        // No cross-category dedup: a hit that is itself a bare URL shows up
        // once as an embedding result and once as an extraction.
        let r = retriever(vec![hit("https://status.example.com", 0.6)]);
        let results = r.retrieve("status page url?").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, results[1].text);
    }
}
