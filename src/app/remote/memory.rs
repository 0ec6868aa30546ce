//! Deterministic in-memory remote store

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{RemoteFile, RemoteStore};
use crate::app::hash::content_hash;
use crate::errors::{FetchError, FetchResult};

/// Failure injected for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The path reports as missing even if an object is registered
    NotFound,
    /// The store answers with a server error
    Unavailable,
    /// The store rejects the credentials
    Unauthorized,
}

impl FailureKind {
    fn to_error(self, path: &str) -> FetchError {
        match self {
            FailureKind::NotFound => FetchError::NotFound {
                path: path.to_string(),
            },
            FailureKind::Unavailable => FetchError::Api {
                status: 503,
                summary: "service unavailable".to_string(),
            },
            FailureKind::Unauthorized => FetchError::Unauthorized,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    modified: DateTime<Utc>,
    content: Vec<u8>,
    content_hash: String,
}

/// Remote store backed by a map of full paths to objects
///
/// Content hashes are computed with the chunked content hasher unless registered
/// explicitly, which lets tests simulate corruption in transit. Every requested
/// path is recorded.
///
/// # Examples
///
/// ```rust
/// use archive_transfer::app::{InMemoryStore, RemoteStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = InMemoryStore::new();
/// store.insert("/root/folder/file.txt", b"hello".to_vec());
///
/// let file = store.download("/root/folder/file.txt").await.unwrap();
/// assert_eq!(file.name, "file.txt");
/// assert_eq!(file.content, b"hello");
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    failures: RwLock<HashMap<String, FailureKind>>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object modified now
    pub fn insert(&self, path: impl Into<String>, content: Vec<u8>) {
        self.insert_modified(path, content, Utc::now());
    }

    /// Register an object with an explicit modification time
    pub fn insert_modified(
        &self,
        path: impl Into<String>,
        content: Vec<u8>,
        modified: DateTime<Utc>,
    ) {
        let content_hash = content_hash(&content).to_hex();
        self.insert_with_hash(path, content, modified, content_hash);
    }

    /// Register an object whose reported hash is `content_hash` regardless of content
    pub fn insert_with_hash(
        &self,
        path: impl Into<String>,
        content: Vec<u8>,
        modified: DateTime<Utc>,
        content_hash: impl Into<String>,
    ) {
        let object = StoredObject {
            modified,
            content,
            content_hash: content_hash.into(),
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), object);
    }

    /// Make every request for `path` fail with `kind`
    pub fn fail(&self, path: impl Into<String>, kind: FailureKind) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), kind);
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, path: &str) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    /// Paths requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lookup(&self, path: &str) -> FetchResult<StoredObject> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());

        let injected = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied();
        if let Some(kind) = injected {
            debug!("Injected {:?} failure for {}", kind, path);
            return Err(kind.to_error(path));
        }

        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
            })
    }
}

impl RemoteStore for InMemoryStore {
    async fn download(&self, path: &str) -> FetchResult<RemoteFile> {
        let object = self.lookup(path)?;
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Ok(RemoteFile {
            name,
            modified: object.modified,
            content: object.content,
            content_hash: object.content_hash,
        })
    }

    async fn download_bytes(&self, path: &str) -> FetchResult<Vec<u8>> {
        Ok(self.lookup(path)?.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_object_is_downloaded() {
        let store = InMemoryStore::new();
        store.insert("/root/folder/file.txt", b"filecontent".to_vec());

        let file = store.download("/root/folder/file.txt").await.unwrap();
        assert_eq!(file.name, "file.txt");
        assert_eq!(file.content, b"filecontent");
        assert_eq!(
            file.content_hash,
            "011399373550287a31dccaa5e7cab7b60f16a04cd3954c1b9d86e04b412521c6"
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.download_bytes("/root/missing.txt").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryStore::new();
        store.insert("/root/folder/file.txt", b"data".to_vec());

        store.fail("/root/folder/file.txt", FailureKind::Unavailable);
        let err = store.download("/root/folder/file.txt").await.unwrap_err();
        assert!(matches!(err, FetchError::Api { status: 503, .. }));

        store.fail("/root/folder/file.txt", FailureKind::NotFound);
        assert!(store
            .download("/root/folder/file.txt")
            .await
            .unwrap_err()
            .is_not_found());

        store.clear_failure("/root/folder/file.txt");
        assert!(store.download("/root/folder/file.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_requests_are_recorded_in_order() {
        let store = InMemoryStore::new();
        let _ = store.download("/a").await;
        let _ = store.download_bytes("/b").await;
        assert_eq!(store.requests(), vec!["/a", "/b"]);
    }
}
