//! Ingestion pipeline orchestration.
//!
//! One run: fetch every page in a space, normalize and chunk each one,
//! fingerprint the cleaned text, and embed only pages whose content is new
//! or changed since the last run. Page evaluations fan out as independent
//! tokio tasks; a failure in one page never aborts the others. Registry
//! mutations happen in a single merge step after all tasks complete, and the
//! registry is persisted exactly once, only when something changed.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::fetch::PageSource;
use crate::models::{ChunkMeta, ProcessedPage};
use crate::registry::{fingerprint, Registry};
use crate::store::SimilarityStore;
use crate::text::process_page;

/// What one ingestion run produced.
#[derive(Debug)]
pub struct IngestOutcome {
    /// Pages embedded or re-embedded this run.
    pub updated: usize,
    /// Cleaned text of every processed page, in fetch order, whether or not
    /// it was re-embedded. Callers use this as the fallback corpus.
    pub corpus: Vec<String>,
}

/// Run one ingestion pass over `space_key`.
///
/// A fetch failure aborts the run and propagates. An empty space is not an
/// error: it logs a warning and returns `(0, [])`.
pub async fn run_ingest(
    config: &Config,
    space_key: &str,
    source: &dyn PageSource,
    store: Arc<dyn SimilarityStore>,
) -> Result<IngestOutcome> {
    let registry_path = &config.registry.path;
    let mut registry = Registry::load(registry_path)?;

    info!(space = space_key, "fetching pages");
    let pages = source
        .fetch_all(space_key)
        .await
        .context("fetching pages from the wiki")?;

    if pages.is_empty() {
        warn!(space = space_key, "no pages found; check the space key or permissions");
        return Ok(IngestOutcome {
            updated: 0,
            corpus: Vec::new(),
        });
    }

    let mut corpus = Vec::with_capacity(pages.len());
    let mut tasks = Vec::with_capacity(pages.len());

    for page in pages {
        let doc = match process_page(&page, config.chunking.chunk_size, config.chunking.overlap) {
            Ok(doc) => doc,
            Err(e) => {
                error!(title = %page.title, error = format!("{e:#}"), "skipping unprocessable page");
                continue;
            }
        };

        corpus.push(doc.cleaned_text.clone());
        let prior = registry.hash_for(&doc.page_id).map(str::to_string);
        tasks.push(tokio::spawn(evaluate_page(doc, prior, Arc::clone(&store))));
    }

    // Single-writer merge: tasks never touch the registry directly.
    let mut updated = 0usize;
    for task in tasks {
        match task.await {
            Ok(Ok(Some((page_id, hash)))) => {
                registry.record(page_id, hash);
                updated += 1;
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => error!(error = format!("{e:#}"), "page evaluation failed"),
            Err(e) => error!(error = %e, "page evaluation task panicked"),
        }
    }

    if updated > 0 {
        registry
            .save(registry_path)
            .context("persisting the ingestion registry")?;
        info!(updated, "pages embedded or updated; registry persisted");
    } else {
        info!("no new or updated pages");
    }

    Ok(IngestOutcome { updated, corpus })
}

/// Decide whether one page needs (re-)embedding and do it.
///
/// Returns the `(page_id, fingerprint)` pair to record when the page was
/// embedded, or `None` when its content is unchanged.
async fn evaluate_page(
    doc: ProcessedPage,
    prior: Option<String>,
    store: Arc<dyn SimilarityStore>,
) -> Result<Option<(String, String)>> {
    let hash = fingerprint(&doc.cleaned_text);

    match prior {
        Some(old) if old == hash => {
            debug!(page_id = %doc.page_id, "content unchanged; skipping");
            return Ok(None);
        }
        Some(_) => {
            info!(page_id = %doc.page_id, "content changed; re-embedding");
            // Full replace: drop the stale chunks, then re-add the new set.
            store.delete_by_page(&doc.page_id).await;
        }
        None => {
            info!(page_id = %doc.page_id, "new page; embedding");
        }
    }

    let metas = vec![
        ChunkMeta {
            page_id: doc.page_id.clone(),
            title: doc.title.clone(),
        };
        doc.chunks.len()
    ];
    debug!(page_id = %doc.page_id, chunks = doc.chunks.len(), "adding chunks");
    store
        .add(doc.chunks, metas)
        .await
        .with_context(|| format!("indexing chunks for page {}", doc.page_id))?;

    Ok(Some((doc.page_id, hash)))
}
