//! Per-object transfer pipeline
//!
//! One [`Transfer`] moves one remote object into its container folder:
//!
//! ```text
//! Planned → ContainerEnsured → Fetched → Persisted → Verified → ManifestWritten → MetadataFetched
//! ```
//!
//! Any failure before `Verified` is terminal for the object and surfaces as a
//! [`TransferError`]. The manifest and the metadata sidecar are best-effort follow-ons
//! reported as [`ArtifactError`] values; the object counts as transferred once it is
//! verified.
//!
//! The object is first written to a `.tmp` sibling and renamed into place only when
//! complete, so a half-written file is never visible at the object path.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::app::hash::{content_hash_file, sha256_file, Sha256Digest};
use crate::app::layout::LocalLayout;
use crate::app::remote::{RemoteFile, RemoteStore};
use crate::constants::files::{TEMP_FILE_SUFFIX, TIMESTAMP_FORMAT};
use crate::errors::{ArtifactError, ArtifactResult, FetchError, TransferError, TransferResult};

/// Outcome of a verified transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Remote modification time, formatted `YYYY-MM-DDTHH:MM:SS.00000Z`
    pub remote_modified: String,
    /// Content hash the local file was verified against
    pub content_hash: String,
    /// Size of the local object
    pub bytes_written: u64,
    /// Always true for a record returned from a successful transfer
    pub verified: bool,
}

/// One manifest line: plain SHA-256 of the object and its file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Plain SHA-256 of the local object
    pub digest: Sha256Digest,
    /// Object file name
    pub file_name: String,
}

impl ManifestEntry {
    /// The manifest line: `"<64 lowercase hex>  <file name>\n"`
    pub fn to_line(&self) -> String {
        format!("{}  {}\n", self.digest.to_hex(), self.file_name)
    }
}

/// Stages of the per-object pipeline, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferStage {
    Planned,
    ContainerEnsured,
    Fetched,
    Persisted,
    Verified,
    ManifestWritten,
    MetadataFetched,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Planned => "planned",
            TransferStage::ContainerEnsured => "container ensured",
            TransferStage::Fetched => "fetched",
            TransferStage::Persisted => "persisted",
            TransferStage::Verified => "verified",
            TransferStage::ManifestWritten => "manifest written",
            TransferStage::MetadataFetched => "metadata fetched",
        };
        f.write_str(name)
    }
}

/// Everything produced by one full pipeline run
#[derive(Debug)]
pub struct ObjectReport {
    /// Verified transfer
    pub record: TransferRecord,
    /// Manifest outcome
    pub manifest: ArtifactResult<ManifestEntry>,
    /// Metadata sidecar outcome
    pub sidecar: ArtifactResult<()>,
}

impl ObjectReport {
    /// Last stage reached in order
    pub fn stage(&self) -> TransferStage {
        match (&self.manifest, &self.sidecar) {
            (Ok(_), Ok(_)) => TransferStage::MetadataFetched,
            (Ok(_), Err(_)) => TransferStage::ManifestWritten,
            (Err(_), _) => TransferStage::Verified,
        }
    }

    /// Whether both best-effort artifacts were produced
    pub fn is_complete(&self) -> bool {
        self.stage() == TransferStage::MetadataFetched
    }
}

/// Transfers one remote object into its planned local layout
#[derive(Debug, Clone)]
pub struct Transfer {
    layout: LocalLayout,
}

impl Transfer {
    /// Create a transfer for a planned layout
    pub fn new(layout: LocalLayout) -> Self {
        Self { layout }
    }

    /// The layout this transfer writes to
    pub fn layout(&self) -> &LocalLayout {
        &self.layout
    }

    /// Make sure the container folder exists
    ///
    /// The submission folder is never created: its presence is the signal that the
    /// intake was approved. Only the container level is created, and an existing
    /// container is reused as-is when `overwrite` is set.
    ///
    /// # Errors
    ///
    /// - `PrerequisiteMissing` if the submission folder does not exist
    /// - `AlreadyExists` if the container exists and `overwrite` is false
    /// - `LocalWriteFailed` if the container cannot be created
    pub async fn ensure_container(&self, overwrite: bool) -> TransferResult<()> {
        let submission = &self.layout.submission_folder;
        let container = &self.layout.container_dir;

        if !is_dir(submission).await {
            error!(
                "The Submission Agreement folder ({}) does not exist yet",
                submission.display()
            );
            return Err(TransferError::PrerequisiteMissing {
                path: submission.clone(),
            });
        }

        if is_dir(container).await {
            if !overwrite {
                error!("The target folder ({}) already exists", container.display());
                return Err(TransferError::AlreadyExists {
                    path: container.clone(),
                });
            }
            debug!("Reusing existing container {}", container.display());
            return Ok(());
        }

        match create_container_dir(container).await {
            Ok(()) => {
                debug!("Created container {}", container.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && overwrite => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                error!("The target folder ({}) already exists", container.display());
                Err(TransferError::AlreadyExists {
                    path: container.clone(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(
                    "The Submission Agreement folder ({}) disappeared",
                    submission.display()
                );
                Err(TransferError::PrerequisiteMissing {
                    path: submission.clone(),
                })
            }
            Err(e) => {
                error!("Failed to create {}: {}", container.display(), e);
                Err(TransferError::LocalWriteFailed {
                    path: container.clone(),
                    source: e,
                })
            }
        }
    }

    /// Fetch, persist and verify the object
    ///
    /// The container must already exist. No phase is skipped and nothing is retried
    /// here; retry policy belongs to the store. A checksum mismatch leaves the written
    /// file in place for inspection.
    ///
    /// # Errors
    ///
    /// - `RemoteObjectMissing` if the store reports the path as missing
    /// - `TransferFailed` for any other fetch failure
    /// - `LocalWriteFailed` if the object cannot be written or read back
    /// - `ChecksumMismatch` if the local content hash differs from the reported one
    pub async fn transfer_object<S: RemoteStore>(&self, store: &S) -> TransferResult<TransferRecord> {
        let remote = self.fetch(store).await?;
        let bytes_written = self.persist(&remote.content).await?;
        self.verify(&remote.content_hash).await?;

        let record = TransferRecord {
            remote_modified: remote.modified.format(TIMESTAMP_FORMAT).to_string(),
            content_hash: remote.content_hash.to_ascii_lowercase(),
            bytes_written,
            verified: true,
        };
        info!(
            "File {} was successfully transferred to {}",
            self.layout.remote.full_path(),
            self.layout.object_path.display()
        );
        Ok(record)
    }

    async fn fetch<S: RemoteStore>(&self, store: &S) -> TransferResult<RemoteFile> {
        let remote_path = self.layout.remote.full_path();
        debug!("Fetching {}", remote_path);

        match store.download(&remote_path).await {
            Ok(remote) => Ok(remote),
            Err(FetchError::NotFound { .. }) => {
                error!("The file {} was not found in the remote store", remote_path);
                Err(TransferError::RemoteObjectMissing { path: remote_path })
            }
            Err(source) => {
                error!("Transfer of {} failed: {}", remote_path, source);
                Err(TransferError::TransferFailed {
                    path: remote_path,
                    source,
                })
            }
        }
    }

    async fn persist(&self, content: &[u8]) -> TransferResult<u64> {
        let final_path = &self.layout.object_path;
        let temp_path = temp_path_for(final_path);

        if let Err(e) = write_synced(&temp_path, content).await {
            let _ = fs::remove_file(&temp_path).await;
            error!("Failed to write {}: {}", final_path.display(), e);
            return Err(TransferError::LocalWriteFailed {
                path: final_path.clone(),
                source: e,
            });
        }

        if let Err(e) = fs::rename(&temp_path, final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            error!("Failed to move {} into place: {}", final_path.display(), e);
            return Err(TransferError::LocalWriteFailed {
                path: final_path.clone(),
                source: e,
            });
        }

        debug!("Wrote {} bytes to {}", content.len(), final_path.display());
        Ok(content.len() as u64)
    }

    async fn verify(&self, expected: &str) -> TransferResult<()> {
        let path = &self.layout.object_path;
        let actual = content_hash_file(path).await.map_err(|e| {
            error!("Failed to read back {}: {}", path.display(), e);
            TransferError::LocalWriteFailed {
                path: path.clone(),
                source: e,
            }
        })?;

        let actual = actual.to_hex();
        let expected = expected.to_ascii_lowercase();
        if actual != expected {
            error!(
                "Checksum validation failed for {}. Expected: {}, got: {}",
                path.display(),
                expected,
                actual
            );
            return Err(TransferError::ChecksumMismatch {
                path: path.clone(),
                expected,
                actual,
            });
        }

        debug!("Checksum validation passed for {}", path.display());
        Ok(())
    }

    /// Write the manifest line for the local object, replacing any previous manifest
    ///
    /// The digest is a plain SHA-256 recomputed from the file on disk.
    pub async fn write_manifest(&self) -> ArtifactResult<ManifestEntry> {
        let manifest_path = &self.layout.manifest_path;
        let manifest_error = |source: std::io::Error| {
            warn!("Failed to write manifest {}: {}", manifest_path.display(), source);
            ArtifactError::Manifest {
                path: manifest_path.clone(),
                source,
            }
        };

        let digest = sha256_file(&self.layout.object_path)
            .await
            .map_err(manifest_error)?;
        let entry = ManifestEntry {
            digest,
            file_name: self.layout.object_file_name().to_string(),
        };
        fs::write(manifest_path, entry.to_line())
            .await
            .map_err(manifest_error)?;

        info!("Manifest created: {}", manifest_path.display());
        Ok(entry)
    }

    /// Copy the remote `default_metadata.json` next to the object, verbatim
    pub async fn fetch_metadata_sidecar<S: RemoteStore>(&self, store: &S) -> ArtifactResult<()> {
        let sidecar_path = self.layout.remote.sidecar_path();
        let metadata_path = &self.layout.metadata_path;

        let content = match store.download_bytes(&sidecar_path).await {
            Ok(content) => content,
            Err(FetchError::NotFound { .. }) => {
                warn!("Metadata sidecar {} was not found", sidecar_path);
                return Err(ArtifactError::SidecarMissing { path: sidecar_path });
            }
            Err(source) => {
                warn!("Failed to fetch metadata sidecar {}: {}", sidecar_path, source);
                return Err(ArtifactError::SidecarFetch {
                    path: sidecar_path,
                    source,
                });
            }
        };

        fs::write(metadata_path, &content).await.map_err(|source| {
            warn!("Failed to write {}: {}", metadata_path.display(), source);
            ArtifactError::SidecarWrite {
                path: metadata_path.clone(),
                source,
            }
        })?;

        info!("Metadata created: {}", metadata_path.display());
        Ok(())
    }

    /// Run the whole pipeline for this object
    ///
    /// # Errors
    ///
    /// Returns the first terminal failure; best-effort failures are carried in the
    /// report instead.
    pub async fn run<S: RemoteStore>(&self, store: &S, overwrite: bool) -> TransferResult<ObjectReport> {
        self.ensure_container(overwrite).await?;
        debug!(
            "{}: {}",
            self.layout.container_dir.display(),
            TransferStage::ContainerEnsured
        );

        let record = self.transfer_object(store).await?;
        let manifest = self.write_manifest().await;
        let sidecar = self.fetch_metadata_sidecar(store).await;

        let report = ObjectReport {
            record,
            manifest,
            sidecar,
        };
        debug!(
            "{}: {}",
            self.layout.object_path.display(),
            report.stage()
        );
        Ok(report)
    }

    /// Recompute the content hash of the local object
    pub async fn verify_local(&self) -> std::io::Result<Sha256Digest> {
        content_hash_file(&self.layout.object_path).await
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

#[cfg(unix)]
async fn create_container_dir(path: &Path) -> std::io::Result<()> {
    use crate::constants::files::CONTAINER_DIR_MODE;

    let mut builder = fs::DirBuilder::new();
    builder.mode(CONTAINER_DIR_MODE);
    builder.create(path).await
}

#[cfg(not(unix))]
async fn create_container_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir(path).await
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::hash::content_hash;
    use crate::app::layout::PathPlanner;
    use crate::app::remote::{FailureKind, InMemoryStore};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    const REMOTE_ROOT: &str = "/foldername/";
    const RELATIVE: &str = "testfolder/testfile.txt";
    const REMOTE_PATH: &str = "/foldername/testfolder/testfile.txt";
    const SIDECAR_PATH: &str = "/foldername/testfolder/default_metadata.json";

    fn setup() -> (TempDir, Transfer) {
        let temp_dir = TempDir::new().unwrap();
        let planner = PathPlanner::new(REMOTE_ROOT, temp_dir.path());
        let transfer = Transfer::new(planner.plan(RELATIVE));
        (temp_dir, transfer)
    }

    async fn with_submission_folder() -> (TempDir, Transfer) {
        let (temp_dir, transfer) = setup();
        fs::create_dir(&transfer.layout().submission_folder)
            .await
            .unwrap();
        (temp_dir, transfer)
    }

    fn store_with_object(content: &[u8]) -> InMemoryStore {
        let store = InMemoryStore::new();
        let modified = Utc.with_ymd_and_hms(1900, 1, 23, 4, 56, 7).unwrap();
        store.insert_modified(REMOTE_PATH, content.to_vec(), modified);
        store
    }

    #[tokio::test]
    async fn test_ensure_container_without_submission_folder() {
        let (_temp_dir, transfer) = setup();

        for overwrite in [false, true] {
            let result = transfer.ensure_container(overwrite).await;
            assert!(matches!(
                result,
                Err(TransferError::PrerequisiteMissing { .. })
            ));
        }
        assert!(!transfer.layout().submission_folder.exists());
    }

    #[tokio::test]
    async fn test_ensure_container_creates_one_level() {
        let (_temp_dir, transfer) = with_submission_folder().await;

        transfer.ensure_container(false).await.unwrap();
        assert!(transfer.layout().container_dir.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_container_existing() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        let container = &transfer.layout().container_dir;
        fs::create_dir(container).await.unwrap();
        let existing = container.join("previous.txt");
        fs::write(&existing, b"keep me").await.unwrap();

        let result = transfer.ensure_container(false).await;
        assert!(matches!(result, Err(TransferError::AlreadyExists { .. })));

        transfer.ensure_container(true).await.unwrap();
        transfer.ensure_container(true).await.unwrap();
        assert_eq!(fs::read(&existing).await.unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_transfer_object_success() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = store_with_object(b"filecontent");

        let record = transfer.transfer_object(&store).await.unwrap();
        assert!(record.verified);
        assert_eq!(record.remote_modified, "1900-01-23T04:56:07.00000Z");
        assert_eq!(record.bytes_written, 11);
        assert_eq!(record.content_hash, content_hash(b"filecontent").to_hex());

        let object_path = &transfer.layout().object_path;
        assert_eq!(fs::read(object_path).await.unwrap(), b"filecontent");
        assert!(!temp_path_for(object_path).exists());
        assert_eq!(
            transfer.verify_local().await.unwrap(),
            content_hash(b"filecontent")
        );
    }

    #[tokio::test]
    async fn test_transfer_object_checksum_mismatch_keeps_file() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = InMemoryStore::new();
        store.insert_with_hash(REMOTE_PATH, b"corrupted".to_vec(), Utc::now(), "ab".repeat(32));

        let result = transfer.transfer_object(&store).await;
        match result {
            Err(TransferError::ChecksumMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, "ab".repeat(32));
                assert_eq!(actual, content_hash(b"corrupted").to_hex());
            }
            other => panic!("Expected ChecksumMismatch, got {:?}", other),
        }
        assert_eq!(
            fs::read(&transfer.layout().object_path).await.unwrap(),
            b"corrupted"
        );
    }

    #[tokio::test]
    async fn test_transfer_object_remote_missing() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = InMemoryStore::new();

        let result = transfer.transfer_object(&store).await;
        match result {
            Err(TransferError::RemoteObjectMissing { path }) => assert_eq!(path, REMOTE_PATH),
            other => panic!("Expected RemoteObjectMissing, got {:?}", other),
        }
        assert!(!transfer.layout().object_path.exists());
    }

    #[tokio::test]
    async fn test_transfer_object_fetch_failure_is_retryable() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = store_with_object(b"filecontent");
        store.fail(REMOTE_PATH, FailureKind::Unavailable);

        let err = transfer.transfer_object(&store).await.unwrap_err();
        assert!(matches!(err, TransferError::TransferFailed { .. }));
        assert!(err.is_retryable());
        assert!(!transfer.layout().object_path.exists());
    }

    #[tokio::test]
    async fn test_local_write_failure_leaves_nothing_behind() {
        // Container was never created, so the write cannot succeed
        let (_temp_dir, transfer) = with_submission_folder().await;
        let store = store_with_object(b"filecontent");

        let result = transfer.transfer_object(&store).await;
        assert!(matches!(
            result,
            Err(TransferError::LocalWriteFailed { .. })
        ));

        let layout = transfer.layout();
        assert!(!layout.object_path.exists());
        assert!(!temp_path_for(&layout.object_path).exists());
        assert!(!layout.manifest_path.exists());
        assert!(!layout.metadata_path.exists());
    }

    #[tokio::test]
    async fn test_write_manifest_matches_plain_sha256() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = store_with_object(b"filecontent");
        transfer.transfer_object(&store).await.unwrap();

        let entry = transfer.write_manifest().await.unwrap();
        assert_eq!(entry.digest, Sha256Digest::of(b"filecontent"));

        let line = fs::read_to_string(&transfer.layout().manifest_path)
            .await
            .unwrap();
        assert_eq!(
            line,
            "5ab24eb0866bafe7d8c0d07f03f09aef7a4caa991a9dc1edd96e64683b750fe2  testfile.txt\n"
        );
        assert_eq!(line, entry.to_line());
    }

    #[tokio::test]
    async fn test_write_manifest_replaces_previous() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let layout = transfer.layout();
        fs::write(&layout.manifest_path, "stale line\nanother\n")
            .await
            .unwrap();
        fs::write(&layout.object_path, b"hello").await.unwrap();

        transfer.write_manifest().await.unwrap();
        let line = fs::read_to_string(&layout.manifest_path).await.unwrap();
        assert_eq!(
            line,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824  testfile.txt\n"
        );
    }

    #[tokio::test]
    async fn test_write_manifest_without_object_fails_softly() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();

        let result = transfer.write_manifest().await;
        assert!(matches!(result, Err(ArtifactError::Manifest { .. })));
        assert!(!transfer.layout().manifest_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_metadata_sidecar() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = InMemoryStore::new();
        let sidecar = br#"{"Title": "Test", "Creator": "Someone"}"#;
        store.insert(SIDECAR_PATH, sidecar.to_vec());

        transfer.fetch_metadata_sidecar(&store).await.unwrap();
        assert_eq!(
            fs::read(&transfer.layout().metadata_path).await.unwrap(),
            sidecar
        );
    }

    #[tokio::test]
    async fn test_fetch_metadata_sidecar_failures() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        transfer.ensure_container(false).await.unwrap();
        let store = InMemoryStore::new();

        let result = transfer.fetch_metadata_sidecar(&store).await;
        assert!(matches!(result, Err(ArtifactError::SidecarMissing { .. })));

        store.fail(SIDECAR_PATH, FailureKind::Unauthorized);
        let result = transfer.fetch_metadata_sidecar(&store).await;
        assert!(matches!(result, Err(ArtifactError::SidecarFetch { .. })));
        assert!(!transfer.layout().metadata_path.exists());
    }

    #[tokio::test]
    async fn test_run_reaches_final_stage() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        let store = store_with_object(b"filecontent");
        store.insert(SIDECAR_PATH, b"{}".to_vec());

        let report = transfer.run(&store, false).await.unwrap();
        assert_eq!(report.stage(), TransferStage::MetadataFetched);
        assert!(report.is_complete());

        let layout = transfer.layout();
        assert!(layout.object_path.exists());
        assert!(layout.manifest_path.exists());
        assert!(layout.metadata_path.exists());
    }

    #[tokio::test]
    async fn test_run_without_sidecar_still_succeeds() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        let store = store_with_object(b"filecontent");

        let report = transfer.run(&store, false).await.unwrap();
        assert_eq!(report.stage(), TransferStage::ManifestWritten);
        assert!(report.record.verified);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_run_refuses_existing_container() {
        let (_temp_dir, transfer) = with_submission_folder().await;
        let store = store_with_object(b"filecontent");
        transfer.run(&store, false).await.unwrap();

        let result = transfer.run(&store, false).await;
        assert!(matches!(result, Err(TransferError::AlreadyExists { .. })));

        let report = transfer.run(&store, true).await.unwrap();
        assert!(report.record.verified);
    }

    #[test]
    fn test_stage_order() {
        assert!(TransferStage::Planned < TransferStage::ContainerEnsured);
        assert!(TransferStage::Verified < TransferStage::ManifestWritten);
        assert_eq!(TransferStage::MetadataFetched.to_string(), "metadata fetched");
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path_for(Path::new("/nas/a/b/file name.pdf")),
            Path::new("/nas/a/b/file name.pdf.tmp")
        );
    }
}
