//! Configuration management for Archive Transfer
//!
//! Two layers are loaded once at startup and then passed explicitly to the
//! components that need them:
//!
//! - [`Config`]: required deployment values read from the environment (and `.env`)
//! - [`Settings`]: optional tuning read from a TOML file, with defaults for every field

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::ClientConfig;
use crate::constants::{batch, env, limits, settings};
use crate::errors::{ConfigError, ConfigResult};

/// Deployment workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workspace {
    /// Offline: never contacts the remote store
    Test,
    /// Uses a pre-generated access token
    Dev,
    /// Prompts for an access token when none is configured
    Prod,
}

impl FromStr for Workspace {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Workspace::Test),
            "dev" => Ok(Workspace::Dev),
            "prod" => Ok(Workspace::Prod),
            other => Err(ConfigError::InvalidValue {
                field: env::WORKSPACE.to_string(),
                value: other.to_string(),
                reason: "Expected one of: test, dev, prod".to_string(),
            }),
        }
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Workspace::Test => "test",
            Workspace::Dev => "dev",
            Workspace::Prod => "prod",
        };
        f.write_str(name)
    }
}

/// Deployment configuration from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deployment workspace
    pub workspace: Workspace,
    /// Dropbox application key
    pub app_key: String,
    /// Remote root folder, always slash-delimited on both ends
    pub remote_folder: String,
    /// Local root folder on the NAS
    pub nas_folder: PathBuf,
    /// Pre-generated access token
    pub access_token: Option<String>,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// Every missing required variable is reported in a single error. Empty values
    /// count as missing.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let missing: Vec<String> = env::REQUIRED
            .iter()
            .filter(|name| read(**name).is_none())
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars { vars: missing });
        }

        let required = |name: &str| {
            read(name).ok_or_else(|| ConfigError::MissingVars {
                vars: vec![name.to_string()],
            })
        };

        let workspace: Workspace = required(env::WORKSPACE)?.parse()?;
        let app_key = required(env::DROPBOX_APP_KEY)?;
        let remote_folder = required(env::DROPBOX_FOLDER)?;
        let nas_folder = required(env::NAS_FOLDER)?;

        Self::validate_remote_folder(&remote_folder)?;
        Self::validate_nas_folder(&nas_folder)?;

        let config = Self {
            workspace,
            app_key,
            remote_folder,
            nas_folder: PathBuf::from(nas_folder),
            access_token: read(env::DROPBOX_ACCESS_TOKEN),
        };
        debug!("Environment variables are present and formatted properly");
        Ok(config)
    }

    fn validate_remote_folder(value: &str) -> ConfigResult<()> {
        if value.starts_with('/') && value.ends_with('/') {
            return Ok(());
        }
        Err(ConfigError::InvalidValue {
            field: env::DROPBOX_FOLDER.to_string(),
            value: value.to_string(),
            reason: "Missing a leading and or trailing slash".to_string(),
        })
    }

    fn validate_nas_folder(value: &str) -> ConfigResult<()> {
        if value.ends_with('/') || value.ends_with('\\') {
            return Ok(());
        }
        Err(ConfigError::InvalidValue {
            field: env::NAS_FOLDER.to_string(),
            value: value.to_string(),
            reason: "Missing a trailing slash".to_string(),
        })
    }
}

/// Optional tuning loaded from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Remote store client settings
    pub client: ClientSettings,
    /// Batch processing settings
    pub batch: BatchSettings,
}

/// TOML-friendly client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for rate-limited, unavailable or dropped requests
    pub max_retries: u32,
    /// First backoff delay, doubled on each retry
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// Team the connected account must belong to
    pub expected_team: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            request_timeout: client.request_timeout,
            connect_timeout: client.connect_timeout,
            rate_limit_rps: client.rate_limit_rps,
            max_retries: client.max_retries,
            retry_base_delay: client.retry_base_delay,
            expected_team: None,
        }
    }
}

impl ClientSettings {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            ..ClientConfig::default()
        }
    }
}

/// TOML-friendly batch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Rows processed at once; 1 keeps the batch strictly sequential
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: batch::DEFAULT_CONCURRENCY,
        }
    }
}

impl Settings {
    /// Load settings from an explicit file, the default location, or defaults
    ///
    /// An explicitly requested file must exist; the default location is optional.
    pub async fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let settings = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                Self::load_from_file(path).await?
            }
            None => match Self::default_path().filter(|path| path.exists()) {
                Some(path) => Self::load_from_file(&path).await?,
                None => {
                    debug!("No settings file found, using defaults");
                    Self::default()
                }
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Default settings file path for the current user
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(settings::APP_DIR).join(settings::FILE_NAME))
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let settings: Settings = toml::from_str(&content)?;
        info!("Loaded settings from: {}", path.display());
        Ok(settings)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be non-zero".to_string(),
            });
        }
        if self.batch.concurrency == 0 || self.batch.concurrency > batch::MAX_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                field: "batch.concurrency".to_string(),
                value: self.batch.concurrency.to_string(),
                reason: format!("Must be between 1 and {}", batch::MAX_CONCURRENCY),
            });
        }
        if self.client.max_retries > limits::MAX_RETRIES * 4 {
            return Err(ConfigError::InvalidValue {
                field: "client.max_retries".to_string(),
                value: self.client.max_retries.to_string(),
                reason: format!("Must be at most {}", limits::MAX_RETRIES * 4),
            });
        }
        Ok(())
    }
}
