//! Core application logic for Archive Transfer
//!
//! This module contains the transfer pipeline: content hashing, path planning, the
//! remote store seam with its Dropbox implementation, the per-object transfer and
//! batch coordination.
//!
//! # Examples
//!
//! ```rust,no_run
//! use archive_transfer::app::{DropboxClient, ClientConfig, PathPlanner, Transfer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DropboxClient::new("access-token", &ClientConfig::default())?;
//! let planner = PathPlanner::new("/ArchivesTransfer/", "/mnt/nas/archive/");
//!
//! let transfer = Transfer::new(planner.plan("agreement-42/annual report.pdf"));
//! let report = transfer.run(&client, false).await?;
//! println!("Transferred, remote modified {}", report.record.remote_modified);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod hash;
pub mod layout;
pub mod remote;
pub mod transfer;

// Re-export main public API
pub use batch::{
    merge_metadata, BatchCoordinator, BatchReport, BatchRow, FileList, RowOutcome, RowSuccess,
};
pub use client::{Account, ClientConfig, DropboxClient, FileMetadata};
pub use hash::{content_hash, content_hash_file, sha256_file, ContentHasher, Sha256Digest};
pub use layout::{plan, LocalLayout, PathPlanner, RemoteObjectRef};
pub use remote::{FailureKind, InMemoryStore, RemoteFile, RemoteStore};
pub use transfer::{ManifestEntry, ObjectReport, Transfer, TransferRecord, TransferStage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);

        let layout = plan("/root/", "folder/file.txt", std::path::Path::new("/nas/"));
        assert_eq!(layout.container_name, "file");
    }
}
