//! Storage abstraction over `object_store`.
//!
//! Delta files are written to the local share folder through
//! `LocalFileSystem`; tests can substitute `InMemory`. Every request emits a
//! `StorageRequest` event.

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{AlreadyExistsSnafu, IoSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider rooted at a single location.
#[derive(Clone)]
pub struct StorageProvider {
    object_store: Arc<dyn ObjectStore>,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a provider rooted at a local directory, creating it if needed.
    pub async fn local(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .context(IoSnafu { root: root.clone() })?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&root).context(ObjectStoreSnafu)?);

        Ok(Self {
            object_store,
            canonical_url: format!("file://{}", root.display()),
        })
    }

    /// Create a provider backed by process memory.
    pub fn in_memory() -> Self {
        Self {
            object_store: Arc::new(InMemory::new()),
            canonical_url: "memory://".to_string(),
        }
    }

    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Get the contents of a file.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let start = Instant::now();
        let result = match self.object_store.get(&path).await {
            Ok(response) => response.bytes().await,
            Err(e) => Err(e),
        };

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)
    }

    /// Write bytes to a path that must not exist yet.
    ///
    /// Returns `StorageError::AlreadyExists` instead of overwriting.
    pub async fn put_new(&self, path: impl Into<Path>, bytes: Bytes) -> Result<(), StorageError> {
        let path = path.into();
        let size = bytes.len();
        let start = Instant::now();
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        let result = self
            .object_store
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        match result {
            Ok(_) => {
                debug!(%path, size, "Wrote object");
                Ok(())
            }
            Err(object_store::Error::AlreadyExists { .. }) => AlreadyExistsSnafu {
                path: path.to_string(),
            }
            .fail(),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_put_new_and_get() {
        let dir = TempDir::new().unwrap();
        let storage = StorageProvider::local(dir.path()).await.unwrap();

        storage
            .put_new("deltas/2024-01-01/a.json", Bytes::from_static(b"[]"))
            .await
            .unwrap();

        let bytes = storage.get("deltas/2024-01-01/a.json").await.unwrap();
        assert_eq!(&bytes[..], b"[]");
        assert!(dir.path().join("deltas/2024-01-01/a.json").exists());
    }

    #[tokio::test]
    async fn test_local_root_is_created() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("share").join("nested");
        StorageProvider::local(&root).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_put_new_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let storage = StorageProvider::local(dir.path()).await.unwrap();

        storage
            .put_new("a.json", Bytes::from_static(b"[1]"))
            .await
            .unwrap();
        let err = storage
            .put_new("a.json", Bytes::from_static(b"[2]"))
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
        let bytes = storage.get("a.json").await.unwrap();
        assert_eq!(&bytes[..], b"[1]");
    }

    #[tokio::test]
    async fn test_in_memory_put_new_refuses_overwrite() {
        let storage = StorageProvider::in_memory();
        storage.put_new("x", Bytes::from_static(b"1")).await.unwrap();
        let err = storage.put_new("x", Bytes::from_static(b"2")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storage = StorageProvider::in_memory();
        let err = storage.get("missing.json").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
