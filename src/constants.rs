//! Application constants for Archive Transfer
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for configuration
pub mod env {
    /// Deployment workspace (`test`, `dev` or `prod`)
    pub const WORKSPACE: &str = "WORKSPACE";

    /// Dropbox application key
    pub const DROPBOX_APP_KEY: &str = "DROPBOX_APP_KEY";

    /// Root folder in Dropbox, with leading and trailing slash
    pub const DROPBOX_FOLDER: &str = "DROPBOX_FOLDER";

    /// Root folder on the NAS, with trailing slash
    pub const NAS_FOLDER: &str = "NAS_FOLDER";

    /// Pre-generated access token (optional)
    pub const DROPBOX_ACCESS_TOKEN: &str = "DROPBOX_ACCESS_TOKEN";

    /// Variables that must be present at startup
    pub const REQUIRED: [&str; 4] = [WORKSPACE, DROPBOX_APP_KEY, DROPBOX_FOLDER, NAS_FOLDER];
}

/// Content hashing constants
pub mod hashing {
    /// Block size of the two-level content hash (4 MiB)
    pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

    /// Read buffer used when hashing local files
    pub const READ_CHUNK_SIZE: usize = 64 * 1024;

    /// Length of a SHA-256 digest rendered as hex
    pub const HEX_DIGEST_LEN: usize = 64;
}

/// Local layout and file naming
pub mod files {
    /// Suffix appended to the object stem for the metadata sidecar
    pub const METADATA_SUFFIX: &str = "_metadata.json";

    /// Suffix appended to the object stem for the checksum manifest
    pub const MANIFEST_SUFFIX: &str = "_manifest.txt";

    /// Name of the metadata sidecar that sits next to each remote object
    pub const REMOTE_SIDECAR_NAME: &str = "default_metadata.json";

    /// Temporary file suffix for atomic writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Permission mode for newly created container folders (Unix only)
    #[cfg(unix)]
    pub const CONTAINER_DIR_MODE: u32 = 0o775;

    /// Timestamp format for the remote modified time
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.00000Z";
}

/// Batch metadata keys
pub mod metadata {
    /// Key holding the transfer timestamp in merged metadata
    pub const TRANSFER_DATE: &str = "Transfer Date";

    /// CSV column headers with their metadata key
    pub const COLUMN_KEYS: [(&str, &str); 3] = [
        ("beginning_year", "Beginning Year"),
        ("ending_year", "Ending Year"),
        ("description", "Description"),
    ];

    /// Indentation used when rewriting metadata JSON
    pub const JSON_INDENT: &[u8] = b"    ";
}

/// Dropbox API endpoints and headers
pub mod dropbox {
    /// RPC endpoint base URL
    pub const API_BASE_URL: &str = "https://api.dropboxapi.com/2/";

    /// Content endpoint base URL
    pub const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com/2/";

    /// File download route (content endpoint)
    pub const DOWNLOAD_ROUTE: &str = "files/download";

    /// Current account route (RPC endpoint)
    pub const CURRENT_ACCOUNT_ROUTE: &str = "users/get_current_account";

    /// Request argument header
    pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";

    /// Response metadata header
    pub const API_RESULT_HEADER: &str = "Dropbox-API-Result";

    /// Namespace scoping header
    pub const PATH_ROOT_HEADER: &str = "Dropbox-API-Path-Root";

    /// Error summary prefix for a missing path
    pub const NOT_FOUND_SUMMARY: &str = "path/not_found";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("archive-transfer/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Rate limiting and retry configuration
pub mod limits {
    use super::Duration;

    /// Default rate limit for API requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

    /// Upper bound on random jitter added to each backoff (milliseconds)
    pub const RETRY_JITTER_MS: u64 = 250;
}

/// Batch processing configuration
pub mod batch {
    /// Default number of rows processed at once
    pub const DEFAULT_CONCURRENCY: usize = 1;

    /// Maximum accepted concurrency
    pub const MAX_CONCURRENCY: usize = 16;
}

/// Settings file location
pub mod settings {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "archive-transfer";

    /// Settings file name
    pub const FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use files::{MANIFEST_SUFFIX, METADATA_SUFFIX, REMOTE_SIDECAR_NAME, TIMESTAMP_FORMAT};
pub use hashing::BLOCK_SIZE;
pub use http::USER_AGENT;
