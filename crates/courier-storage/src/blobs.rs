// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem blob store for media attachments.
//!
//! Keys are relative paths under the configured media root; `url_for`
//! resolves them to `file://` URLs without touching the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use courier_core::{BlobStore, CourierError};

/// Media blobs stored as plain files under a root directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn map_io_err(e: std::io::Error) -> CourierError {
    CourierError::Storage {
        source: Box::new(e),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, CourierError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(map_io_err)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(map_io_err)?;
        debug!(key, size = bytes.len(), "blob stored");
        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), CourierError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_err(e)),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("file://{}", self.path_for(key).display())
    }
}

/// Build the canonical blob key for an attachment.
pub fn attachment_key(tenant_id: &str, attachment_id: &str, file_name: &str) -> String {
    // File names come from the provider; keep only a safe basename.
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment.bin");
    format!("{tenant_id}/{attachment_id}/{base}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_delete_roundtrips() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let key = attachment_key("t1", "att-1", "photo.jpg");
        let url = store.put(&key, b"jpeg bytes").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("photo.jpg"));

        let on_disk = dir.path().join("t1/att-1/photo.jpg");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"jpeg bytes");

        store.delete(&key).await.unwrap();
        assert!(!on_disk.exists());
        // Deleting again is not an error.
        store.delete(&key).await.unwrap();
    }

    #[test]
    fn attachment_key_strips_path_components() {
        let key = attachment_key("t1", "att-1", "../../etc/passwd");
        assert_eq!(key, "t1/att-1/passwd");
        let key = attachment_key("t1", "att-2", "");
        assert_eq!(key, "t1/att-2/attachment.bin");
    }
}
