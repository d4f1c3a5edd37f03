//! Storage abstraction for uploaded note and resource files.
//!
//! Upload requests carry base64 file data; handlers decode it and hand the
//! bytes to a `BlobStore`, which returns the URL stored alongside the row.
//! The default store writes to a local directory. Swapping in an object
//! store only means implementing the trait.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

/// Destination for decoded upload bytes.
pub trait BlobStore: Send + Sync {
    /// Persist the bytes and return the public URL for the stored file.
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String>;

    /// Remove the stored file behind a URL previously returned by `store`.
    ///
    /// Idempotent: a URL with nothing behind it is not an error.
    fn delete(&self, url: &str) -> Result<()>;
}

/// Default store that writes under a local directory.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base: String,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

impl BlobStore for FsBlobStore {
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        // Prefix with a fresh UUID so uploads never collide or overwrite.
        let key = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.root.join(&key);

        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create upload directory {:?}", self.root))?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write upload {path:?}"))?;

        info!(file = %key, size = bytes.len(), "stored upload");

        Ok(format!(
            "{}/{key}",
            self.public_base.trim_end_matches('/')
        ))
    }

    fn delete(&self, url: &str) -> Result<()> {
        let base = self.public_base.trim_end_matches('/');
        let Some(key) = url.strip_prefix(base) else {
            warn!(url, "upload url does not belong to this store");
            return Ok(());
        };
        let key = key.trim_start_matches('/');
        // Stored keys never contain separators (see sanitize_file_name).
        if key.is_empty() || key.contains('/') || key.contains('\\') {
            warn!(url, "refusing to delete upload with a suspicious key");
            return Ok(());
        }

        match std::fs::remove_file(self.root.join(key)) {
            Ok(()) => {
                info!(file = %key, "removed upload");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove upload {key}")),
        }
    }
}

/// Strip path separators and oddball characters from client file names.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_file_name("notes-sem3_v2.pdf"), "notes-sem3_v2.pdf");
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("a b/c.pdf"), "a_b_c.pdf");
    }

    #[test]
    fn sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("///"), "file");
    }

    #[test]
    fn fs_store_writes_and_builds_url() -> Result<()> {
        let root = std::env::temp_dir().join(format!("notenexus-test-{}", Uuid::new_v4()));
        let store = FsBlobStore::new(&root, "/uploads/");

        let url = store.store("summary.pdf", b"hello")?;
        assert!(url.starts_with("/uploads/"), "unexpected url: {url}");
        assert!(url.ends_with("_summary.pdf"), "unexpected url: {url}");

        let key = url.trim_start_matches("/uploads/");
        let bytes = std::fs::read(root.join(key))?;
        assert_eq!(bytes, b"hello");

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn fs_delete_removes_stored_file() -> Result<()> {
        let root = std::env::temp_dir().join(format!("notenexus-test-{}", Uuid::new_v4()));
        let store = FsBlobStore::new(&root, "/uploads");

        let url = store.store("summary.pdf", b"hello")?;
        let key = url.trim_start_matches("/uploads/").to_string();
        assert!(root.join(&key).exists());

        store.delete(&url)?;
        assert!(!root.join(&key).exists());

        // Deleting again is a no-op, not an error.
        store.delete(&url)?;

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn fs_delete_ignores_foreign_and_traversal_urls() -> Result<()> {
        let root = std::env::temp_dir().join(format!("notenexus-test-{}", Uuid::new_v4()));
        let store = FsBlobStore::new(&root, "/uploads");

        store.delete("https://cdn.example.com/other.pdf")?;
        store.delete("/uploads/../../etc/passwd")?;
        store.delete("/uploads/")?;
        Ok(())
    }
}
