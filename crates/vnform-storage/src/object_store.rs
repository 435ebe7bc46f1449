//! C1: byte-addressed blob storage (§6 "Persisted blob layout").
//!
//! The trait boundary is deliberately narrow — put/get/exists by key, plus
//! an object-created notification hook the caller can wire into C3 — so a
//! cloud backend (S3, GCS) can replace `LocalObjectStore` without touching
//! any caller. Grounded on the teacher's local-artifact-store conventions in
//! `sg-core::storage` (path-keyed, content-hash-addressed writes).

use std::path::{Path, PathBuf};
use vnform_core::error::{Result, VnFormError};

pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `key`, returning the bucket name the caller
    /// should record alongside the key.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn exists(&self, key: &str) -> Result<bool>;
    fn bucket(&self) -> &str;
}

/// A filesystem-rooted object store. Keys map directly onto relative paths
/// under `root` (§6: "No directory hierarchy is assumed beyond key
/// prefixes" — `raw/...` is just the first path segment).
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(LocalObjectStore {
            root,
            bucket: bucket.into(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Reject traversal outside `root`; keys are always `raw/...` style
        // generated by this codebase, never user-controlled path strings.
        if key.contains("..") {
            return Err(VnFormError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("object key must not contain '..': {key}"),
            )));
        }
        Ok(self.root.join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(self.bucket.clone())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VnFormError::NotFound(format!("object key '{key}'"))
            } else {
                VnFormError::Io(e)
            }
        })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key)?.exists())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Builds the timestamped raw key for a freshly crawled source (§6:
/// `raw/{slug}-{unix_ts}.{ext}`).
pub fn raw_key(name: &str, unix_ts: i64, ext: &str) -> String {
    format!("raw/{name}-{unix_ts}.{ext}")
}

/// Builds the canonical converted-PDF key for a given input key's stem
/// (§4.3: "upload the PDF under `{stem}.pdf`").
pub fn converted_pdf_key(original_key: &str) -> String {
    let stem = Path::new(original_key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    format!("raw/{stem}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "forms").unwrap();
        store.put("raw/mau-1700000000.docx", b"hello", "application/octet-stream")
            .unwrap();
        assert!(store.exists("raw/mau-1700000000.docx").unwrap());
        assert_eq!(store.get("raw/mau-1700000000.docx").unwrap(), b"hello");
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "forms").unwrap();
        assert!(matches!(
            store.get("raw/nope.pdf"),
            Err(VnFormError::NotFound(_))
        ));
    }

    #[test]
    fn converted_pdf_key_uses_stem() {
        assert_eq!(
            converted_pdf_key("raw/mau-1700000000.docx"),
            "raw/mau-1700000000.pdf"
        );
    }
}
