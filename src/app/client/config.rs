//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! used against the Dropbox API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{dropbox, http, limits};
use crate::errors::{AuthError, AuthResult};

/// Configuration for the Dropbox HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Request timeout, which also bounds a hung download
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for rate-limited, unavailable or dropped requests
    pub max_retries: u32,
    /// First backoff delay, doubled on each retry
    pub retry_base_delay: Duration,
    /// Base URL of the RPC endpoints
    pub api_base_url: String,
    /// Base URL of the content (download) endpoints
    pub content_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: limits::RETRY_BASE_DELAY,
            api_base_url: dropbox::API_BASE_URL.to_string(),
            content_base_url: dropbox::CONTENT_BASE_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> AuthResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .tcp_nodelay(self.tcp_nodelay);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        client_builder.build().map_err(AuthError::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert_eq!(config.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.max_retries, limits::MAX_RETRIES);
        assert_eq!(config.content_base_url, "https://content.dropboxapi.com/2/");
    }

    #[test]
    fn test_client_config_custom() {
        let config = ClientConfig {
            rate_limit_rps: 2,
            ..Default::default()
        };

        assert_eq!(config.rate_limit_rps, 2);
        assert!(config.tcp_nodelay); // Should inherit default values
    }

    #[test]
    fn test_http_client_creation() {
        let config = ClientConfig {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            ..Default::default()
        };

        assert!(config.build_http_client().is_ok());
    }
}
