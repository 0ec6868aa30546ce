//! Core HTTP operations with rate limiting and retry logic
//!
//! Every Dropbox request goes through [`HttpHandler::send`], which waits on the
//! rate limiter and retries rate-limited (429), unavailable (5xx) and dropped
//! requests with exponential backoff plus random jitter. Other statuses are
//! returned to the caller untouched for classification.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, warn};

use crate::constants::limits;
use crate::errors::{AuthError, AuthResult, FetchError, FetchResult};

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client, rate limit and retry policy
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the rate limit is zero
    pub fn new(
        client: Client,
        rate_limit_rps: u32,
        max_retries: u32,
        retry_base_delay: Duration,
    ) -> AuthResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            retry_base_delay,
        })
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> AuthResult<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>> {
        let quota = Quota::per_second(NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            AuthError::InvalidSettings {
                reason: "Rate limit must be non-zero".to_string(),
            }
        })?);
        Ok(RateLimiter::direct(quota))
    }

    /// Sends a request built by `build`, retrying transient failures
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is consumed by
    /// sending. `path` only labels logs and errors.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::RateLimited` when 429 persists,
    /// `FetchError::Api` when a 5xx persists and
    /// `FetchError::MaxRetriesExceeded` when the transport keeps failing
    pub async fn send<F>(&self, path: &str, build: F) -> FetchResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        loop {
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;

            match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_transient(status) {
                        debug!("{} answered HTTP {}", path, status.as_u16());
                        return Ok(response);
                    }

                    if retries >= self.max_retries {
                        error!(
                            "Giving up on {} after {} retries: HTTP {}",
                            path,
                            self.max_retries,
                            status.as_u16()
                        );
                        return Err(transient_status_error(response).await);
                    }

                    retries += 1;
                    let delay = backoff_delay(self.retry_base_delay, retries);
                    warn!(
                        "HTTP {} for {} (attempt {}/{}). Backing off for {}ms",
                        status.as_u16(),
                        path,
                        retries,
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if retries < self.max_retries => {
                    retries += 1;
                    let delay = backoff_delay(self.retry_base_delay, retries);
                    warn!(
                        "Request for {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        path,
                        retries,
                        self.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        "Request for {} failed after {} retries: {}",
                        path, self.max_retries, e
                    );
                    return Err(FetchError::MaxRetriesExceeded {
                        path: path.to_string(),
                        max_retries: self.max_retries,
                    });
                }
            }
        }
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Whether a status is worth retrying
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn transient_status_error(response: Response) -> FetchError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchError::RateLimited;
    }
    let summary = response.text().await.unwrap_or_default();
    FetchError::Api {
        status: status.as_u16(),
        summary,
    }
}

/// Backoff before retry number `attempt` (1-based): `base * 2^attempt` plus jitter
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2_u32.saturating_pow(attempt));
    exponential + Duration::from_millis(fastrand::u64(0..=limits::RETRY_JITTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        assert!(matches!(
            HttpHandler::build_rate_limiter(0),
            Err(AuthError::InvalidSettings { .. })
        ));
    }

    #[tokio::test]
    async fn test_http_handler_creation() {
        let config = ClientConfig::default();
        let client = config.build_http_client().unwrap();
        let handler = HttpHandler::new(client, 5, 3, Duration::from_millis(10));
        assert!(handler.is_ok());
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let base = Duration::from_millis(1000);
        let jitter = Duration::from_millis(limits::RETRY_JITTER_MS);

        for (attempt, expected_ms) in [(1, 2000), (2, 4000), (3, 8000)] {
            let delay = backoff_delay(base, attempt);
            let floor = Duration::from_millis(expected_ms);
            assert!(delay >= floor, "attempt {}: {:?}", attempt, delay);
            assert!(delay <= floor + jitter, "attempt {}: {:?}", attempt, delay);
        }
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_transient(StatusCode::CONFLICT));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
        assert!(!is_transient(StatusCode::OK));
    }
}
