//! The authenticated fetch capability the transfer pipeline consumes
//!
//! [`RemoteStore`] is the only seam between the pipeline and the cloud store.
//! [`DropboxClient`](crate::app::client::DropboxClient) implements it over HTTP and
//! [`InMemoryStore`] implements it for tests and the offline workspace.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::errors::FetchResult;

pub mod memory;

pub use memory::{FailureKind, InMemoryStore};

/// A downloaded object together with the metadata the store reported for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Object name as reported by the store
    pub name: String,
    /// Modification time recorded by the store
    pub modified: DateTime<Utc>,
    /// Object bytes
    pub content: Vec<u8>,
    /// Content hash reported by the store (lowercase hex)
    pub content_hash: String,
}

/// Byte-fetch capability keyed by full remote path
///
/// Implementations own authentication, rate limiting and any retry policy. A path
/// that does not exist must be reported as [`FetchError::NotFound`] so callers can
/// tell it apart from transport failures.
///
/// [`FetchError::NotFound`]: crate::errors::FetchError::NotFound
pub trait RemoteStore: Send + Sync {
    /// Download an object along with its reported modification time and content hash
    fn download(&self, path: &str) -> impl Future<Output = FetchResult<RemoteFile>> + Send;

    /// Download raw bytes (sidecars and file lists)
    fn download_bytes(&self, path: &str) -> impl Future<Output = FetchResult<Vec<u8>>> + Send;
}
