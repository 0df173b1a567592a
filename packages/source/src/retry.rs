//! Download with retry and exponential backoff.
//!
//! The SSMSI files sit behind data.gouv.fr redirects to an object store
//! that occasionally answers 5xx, rate-limits, or drops a ~30 MB body
//! halfway. [`download`] retries those cases and gives up immediately on
//! any other 4xx.

use std::time::Duration;

use reqwest::StatusCode;

use crate::SourceError;

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusVerdict {
    /// Read the body.
    Accept,
    /// Send the request again after a delay.
    Retry,
    /// Fail without retrying.
    Reject,
}

/// Classifies a response status: 429 and 5xx are retried, other 4xx
/// are permanent.
#[must_use]
pub fn classify(status: StatusCode) -> StatusVerdict {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusVerdict::Retry
    } else if status.is_client_error() {
        StatusVerdict::Reject
    } else {
        StatusVerdict::Accept
    }
}

/// Retry limits and backoff base for one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries of the request itself (connection errors, timeouts,
    /// retryable statuses).
    pub max_retries: u32,
    /// Full re-downloads after the body was cut off. Each one gets its own
    /// `max_retries` request retries.
    pub max_body_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 request retries (2s, 4s, 8s, 16s, 32s) and 3 body retries.
    fn default() -> Self {
        Self {
            max_retries: 5,
            max_body_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-based retry.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}

/// Downloads the full body at `url`.
///
/// # Errors
///
/// * [`SourceError::Status`] for a 4xx other than 429, or a retryable
///   status that persisted through every retry
/// * [`SourceError::Http`] for a transport failure that persisted through
///   every retry
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, SourceError> {
    let mut body_retry = 0;

    loop {
        let response = request(client, url, policy).await?;
        let expected = response.content_length();

        match response.bytes().await {
            Ok(bytes) => {
                log::debug!("Downloaded {} bytes from {url}", bytes.len());
                return Ok(bytes.to_vec());
            }
            Err(e) if body_retry < policy.max_body_retries => {
                body_retry += 1;
                let delay = policy.delay(body_retry);
                log::warn!(
                    "Body of {url} cut off ({e}, expected {expected:?} bytes), \
                     downloading again in {delay:?} ({body_retry}/{})",
                    policy.max_body_retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!("Giving up on {url} after {body_retry} body retries: {e}");
                return Err(SourceError::Http(e));
            }
        }
    }
}

async fn request(
    client: &reqwest::Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, SourceError> {
    let mut retry = 0;

    loop {
        let failure = match client.get(url).send().await {
            Ok(response) => match classify(response.status()) {
                StatusVerdict::Accept => return Ok(response),
                StatusVerdict::Reject => return Err(status_error(&response)),
                StatusVerdict::Retry if retry >= policy.max_retries => {
                    return Err(status_error(&response));
                }
                StatusVerdict::Retry => format!("HTTP {}", response.status()),
            },
            Err(e) if is_transient(&e) && retry < policy.max_retries => e.to_string(),
            Err(e) => return Err(SourceError::Http(e)),
        };

        retry += 1;
        let delay = policy.delay(retry);
        log::warn!(
            "{url}: {failure}, retry {retry}/{} in {delay:?}",
            policy.max_retries
        );
        tokio::time::sleep(delay).await;
    }
}

fn status_error(response: &reqwest::Response) -> SourceError {
    SourceError::Status {
        status: response.status().as_u16(),
        url: response.url().to_string(),
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_from_the_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(32));
    }

    #[test]
    fn only_rate_limits_and_server_errors_are_retried() {
        assert_eq!(classify(StatusCode::OK), StatusVerdict::Accept);
        assert_eq!(classify(StatusCode::FOUND), StatusVerdict::Accept);
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS), StatusVerdict::Retry);
        assert_eq!(classify(StatusCode::BAD_GATEWAY), StatusVerdict::Retry);
        assert_eq!(classify(StatusCode::NOT_FOUND), StatusVerdict::Reject);
        assert_eq!(classify(StatusCode::FORBIDDEN), StatusVerdict::Reject);
    }
}
