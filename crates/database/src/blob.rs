//! Opaque file storage for uploaded materials.
//!
//! Stored paths are relative to the store and scoped by owner, e.g.
//! `3f0c.../9b21....pdf`. Record deletion never waits on a failed blob
//! deletion; see [`release_blob`].

use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use log::{debug, warn};
use models::material::{allowed_extension, mime_for_extension};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob {0} not found")]
    NotFound(String),

    #[error("invalid blob path {0:?}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the path to persist
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, BlobError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    async fn delete(&self, path: &str) -> Result<(), BlobError>;
}

/// Reference to an uploaded file, attached to a material on creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
}

/// Upload restrictions applied before anything reaches the store
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: models::material::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Validates and stores an upload under the owner's scope
pub async fn store_upload(
    store: &dyn BlobStore,
    policy: UploadPolicy,
    owner_id: Uuid,
    file_name: &str,
    bytes: &[u8],
) -> ServiceResult<FileRef> {
    let file_name = file_name.trim();
    if file_name.chars().any(char::is_control) {
        return Err(ServiceError::validation(
            "file",
            "file name must not contain control characters",
        ));
    }
    let ext = allowed_extension(file_name).ok_or_else(|| {
        ServiceError::validation("file", format!("file type of {file_name:?} is not allowed"))
    })?;

    if bytes.is_empty() {
        return Err(ServiceError::validation("file", "file is empty"));
    }

    let size = bytes.len() as u64;
    if size > policy.max_bytes {
        return Err(ServiceError::validation(
            "file",
            format!("file is {size} bytes, the limit is {}", policy.max_bytes),
        ));
    }

    let path = format!("{owner_id}/{}.{ext}", Uuid::new_v4());
    let stored = store.put(&path, bytes).await?;
    debug!("Stored upload {file_name:?} at {stored} ({size} bytes)");

    Ok(FileRef {
        name: file_name.to_owned(),
        path: stored,
        size: size as i64,
        mime_type: mime_for_extension(&ext).to_owned(),
    })
}

/// Deletes a blob, retrying once. A blob that is already gone counts as
/// released. Returns a warning message instead of failing.
pub async fn release_blob(store: &dyn BlobStore, path: &str) -> Option<String> {
    let mut last_error = None;

    for attempt in 1..=2 {
        match store.delete(path).await {
            Ok(()) => return None,
            Err(BlobError::NotFound(_)) => {
                debug!("Blob {path} was already deleted");
                return None;
            }
            Err(e) => {
                debug!("Attempt {attempt} to delete blob {path} failed: {e}");
                last_error = Some(e);
            }
        }
    }

    let message = format!(
        "failed to delete blob {path}: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    );
    warn!("{message}");
    Some(message)
}

/// Blob store backed by a directory on the local filesystem
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a stored path, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(BlobError::InvalidPath(path.to_owned()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        Ok(path.to_owned())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(path.to_owned()),
            _ => BlobError::Io(e),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(path.to_owned()),
            _ => BlobError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FlakyBlobStore;

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let owner = Uuid::new_v4();
        let file = store_upload(&store, UploadPolicy::default(), owner, "notes.pdf", b"%PDF-1.7")
            .await
            .unwrap();

        assert!(file.path.starts_with(&owner.to_string()));
        assert_eq!(file.size, 8);
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(store.get(&file.path).await.unwrap(), b"%PDF-1.7");

        store.delete(&file.path).await.unwrap();
        assert!(matches!(
            store.get(&file.path).await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(matches!(
            store.get("../etc/passwd").await,
            Err(BlobError::InvalidPath(_))
        ));
        assert!(matches!(
            store.delete("/etc/passwd").await,
            Err(BlobError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_store_upload_policy() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let owner = Uuid::new_v4();

        let rejected = store_upload(&store, UploadPolicy::default(), owner, "run.exe", b"MZ").await;
        assert!(matches!(
            rejected,
            Err(ServiceError::Validation { field: "file", .. })
        ));

        let tiny = UploadPolicy { max_bytes: 4 };
        let too_big = store_upload(&store, tiny, owner, "notes.txt", b"12345").await;
        assert!(matches!(too_big, Err(ServiceError::Validation { .. })));

        let empty = store_upload(&store, UploadPolicy::default(), owner, "notes.txt", b"").await;
        assert!(matches!(empty, Err(ServiceError::Validation { .. })));

        for name in ["a\nb.pdf", "notes\r.txt", "a\u{7f}.pdf"] {
            let control = store_upload(&store, UploadPolicy::default(), owner, name, b"%PDF").await;
            assert!(matches!(
                control,
                Err(ServiceError::Validation { field: "file", .. })
            ));
        }
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_release_blob_retries_once() {
        // Fails once, then succeeds
        let store = FlakyBlobStore::failing_deletes(1);
        assert_eq!(release_blob(&store, "a/b.pdf").await, None);
        assert_eq!(store.delete_attempts(), 2);

        // Fails every time: downgraded to a warning after two attempts
        let store = FlakyBlobStore::failing_deletes(usize::MAX);
        let warning = release_blob(&store, "a/b.pdf").await;
        assert!(warning.unwrap().contains("a/b.pdf"));
        assert_eq!(store.delete_attempts(), 2);
    }
}
