//! Content fingerprinting and the ingestion registry.
//!
//! The registry is the single source of truth for "has this content already
//! been indexed": a durable mapping from page id to the SHA-256 digest of the
//! page's cleaned text. It is loaded once at the start of an ingestion run,
//! merged in memory by a single writer after the per-page tasks finish, and
//! persisted once at the end, atomically via write-to-temp-then-rename, so
//! a crash mid-run can never corrupt the previously persisted state.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Compute the content fingerprint of a page's cleaned text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Durable mapping `page_id -> content fingerprint`.
///
/// An entry exists iff that page has been embedded at least once. On disk
/// this is a flat JSON object, the same shape the store has always used.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, String>,
}

impl Registry {
    /// Load the registry from `path`. A missing file is an empty registry,
    /// not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading registry file {}", path.display()))?;
        let entries = serde_json::from_str(&raw)
            .with_context(|| format!("parsing registry file {}", path.display()))?;
        Ok(Self { entries })
    }

    /// Persist the registry to `path`, all-or-nothing.
    ///
    /// Writes to a sibling temp file and renames it into place, so readers
    /// only ever observe the old contents or the new contents in full.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating registry directory {}", parent.display()))?;
            }
        }

        let tmp = path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(&tmp, body)
            .with_context(|| format!("writing registry temp file {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replacing registry file {}", path.display()))?;
        Ok(())
    }

    /// The last-known fingerprint for a page, if it was ever embedded.
    pub fn hash_for(&self, page_id: &str) -> Option<&str> {
        self.entries.get(page_id).map(String::as_str)
    }

    /// Record (or overwrite) the fingerprint for a page.
    pub fn record(&mut self, page_id: String, hash: String) {
        self.entries.insert(page_id, hash);
    }

    /// Drop a page's entry. Returns whether it existed.
    pub fn remove(&mut self, page_id: &str) -> bool {
        self.entries.remove(page_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_deterministic_hex() {
        let a = fingerprint("some cleaned text");
        let b = fingerprint("some cleaned text");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_differs_on_change() {
        assert_ne!(fingerprint("v1"), fingerprint("v2"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::load(&tmp.path().join("absent.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("registry.json");

        let mut registry = Registry::default();
        registry.record("123".to_string(), fingerprint("body one"));
        registry.record("456".to_string(), fingerprint("body two"));
        registry.save(&path).unwrap();

        let reloaded = Registry::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.hash_for("123"), Some(fingerprint("body one").as_str()));
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut registry = Registry::default();
        registry.record("1".to_string(), "abc".to_string());
        assert!(registry.remove("1"));
        assert!(!registry.remove("1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("registry.json");

        let mut registry = Registry::default();
        registry.record("1".to_string(), "abc".to_string());
        registry.save(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dir").join("registry.json");

        Registry::default().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unsaved_mutations_do_not_touch_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("registry.json");

        let mut registry = Registry::default();
        registry.record("1".to_string(), "old".to_string());
        registry.save(&path).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        // Mutate in memory only: the file must be byte-identical.
        let mut reloaded = Registry::load(&path).unwrap();
        reloaded.record("2".to_string(), "new".to_string());
        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);
    }
}
