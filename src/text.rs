//! Markup normalization and word-window chunking.
//!
//! [`clean`] strips storage markup down to plain text; [`chunk`] slides a
//! fixed-size, overlapping word window over it. Both are pure and total:
//! they never fail and never touch I/O, so they are safe to run inside
//! concurrent ingestion tasks.

use anyhow::{bail, Result};
use regex::Regex;
use std::sync::LazyLock;

use crate::models::{Page, ProcessedPage};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip angle-bracket markup tags and collapse whitespace runs (including
/// newlines) to a single space, then trim.
pub fn clean(markup: &str) -> String {
    let text = TAG_RE.replace_all(markup, " ");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Split `text` on whitespace and produce successive windows of `chunk_size`
/// words, each window starting `overlap` words before the previous window's
/// end.
///
/// The cursor is clamped so it always advances: when `overlap >= chunk_size`
/// the next window simply starts where the previous one ended. Empty input
/// (or a zero chunk size) yields an empty vec.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));

        let next = (start + chunk_size).saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Normalize and chunk a fetched page.
///
/// Fails only when the page carries no usable identifier, since such a page
/// cannot be keyed in the registry or the store.
pub fn process_page(page: &Page, chunk_size: usize, overlap: usize) -> Result<ProcessedPage> {
    if page.id.trim().is_empty() {
        bail!("page '{}' has no id; cannot index it", page.title);
    }

    let cleaned_text = clean(&page.body);
    let chunks = chunk(&cleaned_text, chunk_size, overlap);

    Ok(ProcessedPage {
        page_id: page.id.clone(),
        title: page.title.clone(),
        cleaned_text,
        chunks,
    })
}
