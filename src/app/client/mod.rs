//! HTTP client implementation for the Dropbox API
//!
//! This module provides the [`RemoteStore`] used in the `dev` and `prod` workspaces,
//! with rate limiting and exponential backoff for reliable access.
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with resilience patterns

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::app::remote::{RemoteFile, RemoteStore};
use crate::constants::dropbox;
use crate::errors::{AuthError, AuthResult, FetchError, FetchResult};

pub mod config;
pub mod http;

pub use config::ClientConfig;

use http::HttpHandler;

/// File metadata carried in the `Dropbox-API-Result` header of a download
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMetadata {
    /// File name
    pub name: String,
    /// Modification time set by the uploading client
    pub client_modified: DateTime<Utc>,
    /// Chunked SHA-256 content hash (lowercase hex)
    pub content_hash: String,
    /// File size in bytes
    pub size: u64,
}

/// The connected account as reported by `users/get_current_account`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Display name of the user
    pub display_name: String,
    /// Team name, if the account belongs to a team
    pub team_name: Option<String>,
    /// Namespace id of the account's root (the team space for team members)
    pub root_namespace_id: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    name: AccountName,
    #[serde(default)]
    team: Option<TeamInfo>,
    root_info: RootInfo,
}

#[derive(Debug, Deserialize)]
struct AccountName {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct TeamInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RootInfo {
    root_namespace_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_summary: String,
}

/// HTTP client for the Dropbox API
///
/// Handles authentication headers, namespace scoping, rate limiting and downloads
/// with proper error classification and retry logic.
#[derive(Debug)]
pub struct DropboxClient {
    http_handler: HttpHandler,
    access_token: String,
    download_url: Url,
    account_url: Url,
    path_root: Option<String>,
}

impl DropboxClient {
    /// Creates a client authenticated with `access_token`
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the HTTP client cannot be built or the configured
    /// endpoints are not valid URLs
    pub fn new(access_token: impl Into<String>, config: &ClientConfig) -> AuthResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(
            client,
            config.rate_limit_rps,
            config.max_retries,
            config.retry_base_delay,
        )?;

        let download_url = endpoint(&config.content_base_url, dropbox::DOWNLOAD_ROUTE)?;
        let account_url = endpoint(&config.api_base_url, dropbox::CURRENT_ACCOUNT_ROUTE)?;

        Ok(Self {
            http_handler,
            access_token: access_token.into(),
            download_url,
            account_url,
            path_root: None,
        })
    }

    /// Scope subsequent requests to the namespace `root_namespace_id`
    ///
    /// Team members need this to address team folders by their visible path.
    pub fn with_path_root(mut self, root_namespace_id: impl Into<String>) -> Self {
        self.path_root = Some(path_root_header(&root_namespace_id.into()));
        self
    }

    /// Looks up the connected account
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unauthorized` when the token is rejected
    pub async fn current_account(&self) -> FetchResult<Account> {
        let response = self
            .http_handler
            .send(dropbox::CURRENT_ACCOUNT_ROUTE, |client| {
                client
                    .post(self.account_url.clone())
                    .header(AUTHORIZATION, self.bearer())
                    .header(CONTENT_TYPE, "application/json")
                    .body("null")
            })
            .await?;
        let response = check_status(response, dropbox::CURRENT_ACCOUNT_ROUTE).await?;

        let account: AccountResponse = response.json().await?;
        let account = Account {
            display_name: account.name.display_name,
            team_name: account.team.map(|team| team.name),
            root_namespace_id: account.root_info.root_namespace_id,
        };
        info!("Connected to Dropbox as {}", account.display_name);
        Ok(account)
    }

    /// Downloads `path`, returning the metadata header and the response body
    async fn fetch(&self, path: &str) -> FetchResult<(FileMetadata, Vec<u8>)> {
        let arg = api_arg_header(path);
        let response = self
            .http_handler
            .send(path, |client| {
                let mut request = client
                    .post(self.download_url.clone())
                    .header(AUTHORIZATION, self.bearer())
                    .header(dropbox::API_ARG_HEADER, arg.as_str());
                if let Some(path_root) = &self.path_root {
                    request = request.header(dropbox::PATH_ROOT_HEADER, path_root.as_str());
                }
                request
            })
            .await?;
        let response = check_status(response, path).await?;

        let metadata = result_header(&response)?;
        let content = response.bytes().await?.to_vec();
        if content.len() as u64 != metadata.size {
            debug!(
                "{}: received {} bytes, metadata reports {}",
                path,
                content.len(),
                metadata.size
            );
        }
        Ok((metadata, content))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl RemoteStore for DropboxClient {
    async fn download(&self, path: &str) -> FetchResult<RemoteFile> {
        let (metadata, content) = self.fetch(path).await?;
        debug!("Downloaded {} ({} bytes)", path, content.len());
        Ok(RemoteFile {
            name: metadata.name,
            modified: metadata.client_modified,
            content,
            content_hash: metadata.content_hash,
        })
    }

    async fn download_bytes(&self, path: &str) -> FetchResult<Vec<u8>> {
        let (_, content) = self.fetch(path).await?;
        Ok(content)
    }
}

fn endpoint(base: &str, route: &str) -> AuthResult<Url> {
    Url::parse(base)
        .and_then(|base| base.join(route))
        .map_err(|e| AuthError::InvalidSettings {
            reason: format!("Invalid endpoint {}{}: {}", base, route, e),
        })
}

/// Serialize the `Dropbox-API-Arg` header for `path`
///
/// HTTP header values must be ASCII, so `DEL` and everything outside ASCII is
/// written as JSON `\uXXXX` escapes (UTF-16 surrogate pairs above the BMP).
pub(crate) fn api_arg_header(path: &str) -> String {
    let json = serde_json::json!({ "path": path }).to_string();
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            escaped.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            escaped.push_str(&format!("\\u{:04x}", unit));
        }
    }
    escaped
}

/// Serialize the `Dropbox-API-Path-Root` header value
pub(crate) fn path_root_header(root_namespace_id: &str) -> String {
    serde_json::json!({ ".tag": "root", "root": root_namespace_id }).to_string()
}

fn result_header(response: &Response) -> FetchResult<FileMetadata> {
    let raw = response
        .headers()
        .get(dropbox::API_RESULT_HEADER)
        .ok_or(FetchError::MissingResultHeader {
            header: dropbox::API_RESULT_HEADER,
        })?;
    let raw = raw.to_str().map_err(|e| FetchError::InvalidResult {
        reason: e.to_string(),
    })?;
    parse_file_metadata(raw)
}

pub(crate) fn parse_file_metadata(raw: &str) -> FetchResult<FileMetadata> {
    serde_json::from_str(raw).map_err(|e| FetchError::InvalidResult {
        reason: e.to_string(),
    })
}

async fn check_status(response: Response, path: &str) -> FetchResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body, path))
}

/// Map an unsuccessful, non-retried response to a `FetchError`
pub(crate) fn classify_error(status: StatusCode, body: &str, path: &str) -> FetchError {
    let summary = serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error_summary)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::CONFLICT if summary.starts_with(dropbox::NOT_FOUND_SUMMARY) => {
            FetchError::NotFound {
                path: path.to_string(),
            }
        }
        _ => FetchError::Api {
            status: status.as_u16(),
            summary,
        },
    }
}
