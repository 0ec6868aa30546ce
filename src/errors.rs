//! Error types for Archive Transfer
//!
//! This module defines the error types for every component of the application.
//! The per-object transfer taxonomy (`TransferError`) is kept separate from the
//! best-effort artifact failures (`ArtifactError`) so callers can tell "the object
//! did not arrive" apart from "an auditing side file could not be produced".

use std::path::PathBuf;
use thiserror::Error;

/// Chunked content hasher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// `update` or a second finalize was attempted after the digest was taken
    #[error("hasher already finalized")]
    Finalized,

    /// Hex string is not a 64-character SHA-256 digest
    #[error("Invalid SHA-256 hex digest: {hash}")]
    InvalidHex { hash: String },
}

/// Errors raised by a remote store while fetching bytes
#[derive(Error, Debug)]
pub enum FetchError {
    /// The remote path does not exist
    #[error("Remote file not found: {path}")]
    NotFound { path: String },

    /// Access token rejected by the remote store
    #[error("Remote store rejected the access token")]
    Unauthorized,

    /// Rate limit still exceeded after retries
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimited,

    /// Remote store answered with an error status
    #[error("Remote store error: HTTP {status}: {summary}")]
    Api { status: u16, summary: String },

    /// HTTP transport error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Download response carried no file metadata header
    #[error("Download response is missing the {header} header")]
    MissingResultHeader { header: &'static str },

    /// File metadata header could not be decoded
    #[error("Invalid file metadata from remote store: {reason}")]
    InvalidResult { reason: String },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for {path}")]
    MaxRetriesExceeded { path: String, max_retries: u32 },
}

impl FetchError {
    /// Whether the remote store reported the path as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Per-object transfer failures
///
/// Each variant is terminal for the object it was raised for.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The submission agreement folder has not been provisioned
    #[error("The Submission Agreement folder ({path}) does not exist yet")]
    PrerequisiteMissing { path: PathBuf },

    /// Container folder exists and overwrite was not requested
    #[error("The target folder ({path}) already exists. Use --overwrite to replace its contents")]
    AlreadyExists { path: PathBuf },

    /// The object is not present in the remote store
    #[error("The file {path} was not found in the remote store")]
    RemoteObjectMissing { path: String },

    /// Network or protocol failure while fetching the object
    #[error("Transfer of {path} failed")]
    TransferFailed {
        path: String,
        #[source]
        source: FetchError,
    },

    /// The fetched bytes could not be written locally
    #[error("Failed to write {path}")]
    LocalWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local content hash differs from the one reported by the remote store
    #[error("Checksum validation failed for {path}. Expected: {expected}, got: {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl TransferError {
    /// Whether running the same object again may succeed without outside intervention
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::TransferFailed { .. } | TransferError::LocalWriteFailed { .. }
        )
    }

    /// Short name of the failure class, used in logs and batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::PrerequisiteMissing { .. } => "prerequisite-missing",
            TransferError::AlreadyExists { .. } => "already-exists",
            TransferError::RemoteObjectMissing { .. } => "remote-object-missing",
            TransferError::TransferFailed { .. } => "transfer-failed",
            TransferError::LocalWriteFailed { .. } => "local-write-failed",
            TransferError::ChecksumMismatch { .. } => "checksum-mismatch",
        }
    }
}

/// Best-effort artifact failures (manifest, metadata sidecar, metadata merge)
///
/// These never abort an object that has already been verified.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Manifest could not be computed or written
    #[error("Failed to write manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata sidecar is not present next to the remote object
    #[error("Metadata sidecar {path} was not found in the remote store")]
    SidecarMissing { path: String },

    /// Metadata sidecar fetch failed
    #[error("Failed to fetch metadata sidecar {path}")]
    SidecarFetch {
        path: String,
        #[source]
        source: FetchError,
    },

    /// Metadata sidecar could not be written locally
    #[error("Failed to write metadata sidecar {path}")]
    SidecarWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Row metadata could not be merged into the local sidecar
    #[error("Failed to merge metadata into {path}: {reason}")]
    MetadataMerge { path: PathBuf, reason: String },
}

/// Batch row source (CSV) errors
#[derive(Error, Debug)]
pub enum RowsError {
    /// The CSV could not be fetched
    #[error("Failed to fetch file list {path}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    /// The CSV is not valid UTF-8
    #[error("File list {path} is not valid UTF-8")]
    Encoding { path: String },

    /// The CSV has no header row
    #[error("File list {path} is empty")]
    Empty { path: String },

    /// A line could not be parsed
    #[error("Invalid file list format at line {line}: {reason}")]
    InvalidFormat { line: usize, reason: String },
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// No access token configured and none entered
    #[error("Missing Dropbox access token. Set DROPBOX_ACCESS_TOKEN or enter one when prompted")]
    MissingToken,

    /// Token rejected by the remote store
    #[error("Invalid access token; try re-generating an access token from the app console")]
    InvalidToken,

    /// Remote account lookup failed
    #[error("Account lookup failed")]
    Account(#[from] FetchError),

    /// HTTP client could not be built
    #[error("HTTP client creation failed")]
    Http(#[from] reqwest::Error),

    /// Reading the token from the terminal failed
    #[error("Failed to read access token from terminal")]
    Prompt(#[from] std::io::Error),

    /// Connected account is not a member of the expected team
    #[error("Connected account belongs to {actual}, expected team {expected}")]
    TeamMismatch { expected: String, actual: String },

    /// The test workspace never contacts the remote store
    #[error("The test workspace does not connect to Dropbox")]
    OfflineWorkspace,

    /// Invalid client settings
    #[error("Invalid client settings: {reason}")]
    InvalidSettings { reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more required environment variables are unset
    #[error("Missing required environment variables: {}", vars.join(", "))]
    MissingVars { vars: Vec<String> },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Settings file not found
    #[error("Settings file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid settings file format
    #[error("Invalid settings file format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Settings file could not be read
    #[error("Failed to read settings file")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Content hash error
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Remote fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Best-effort artifact error
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Batch row source error
    #[error(transparent)]
    Rows(#[from] RowsError),

    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Transfer(e) => e.is_retryable(),
            AppError::Fetch(FetchError::Http(_))
            | AppError::Fetch(FetchError::RateLimited)
            | AppError::Fetch(FetchError::MaxRetriesExceeded { .. })
            | AppError::Auth(AuthError::Http(_)) => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Hash(_) => "hash",
            AppError::Fetch(_) => "fetch",
            AppError::Transfer(_) => "transfer",
            AppError::Artifact(_) => "artifact",
            AppError::Rows(_) => "rows",
            AppError::Auth(_) => "authentication",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Hash result type alias
pub type HashResult<T> = std::result::Result<T, HashError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Artifact result type alias
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;

/// Row source result type alias
pub type RowsResult<T> = std::result::Result<T, RowsError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_retryability() {
        let missing = TransferError::RemoteObjectMissing {
            path: "/root/folder/file.pdf".to_string(),
        };
        assert!(!missing.is_retryable());
        assert_eq!(missing.kind(), "remote-object-missing");

        let failed = TransferError::TransferFailed {
            path: "/root/folder/file.pdf".to_string(),
            source: FetchError::RateLimited,
        };
        assert!(failed.is_retryable());

        let mismatch = TransferError::ChecksumMismatch {
            path: PathBuf::from("/nas/folder/file/file.pdf"),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert!(!mismatch.is_retryable());
    }

    #[test]
    fn test_missing_vars_message_lists_all() {
        let err = ConfigError::MissingVars {
            vars: vec!["WORKSPACE".to_string(), "NAS_FOLDER".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: WORKSPACE, NAS_FOLDER"
        );
    }

    #[test]
    fn test_app_error_category() {
        let app_error = AppError::from(TransferError::AlreadyExists {
            path: PathBuf::from("/nas/folder/file"),
        });
        assert_eq!(app_error.category(), "transfer");
        assert!(!app_error.is_recoverable());

        let hash_error = AppError::from(HashError::Finalized);
        assert_eq!(hash_error.to_string(), "hasher already finalized");
    }
}
