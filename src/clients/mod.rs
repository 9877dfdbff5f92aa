//! Native HTTP clients for the external collaborators.
//!
//! Direct HTTP via reqwest; tokens come from configuration (no OAuth
//! flows, the services here use long-lived API tokens).
//!
//! Modules:
//! - chat: chat platform Web API (channel topic, user lookup by email)
//! - schedule: on-call schedule API (current on-call for a schedule)

pub mod chat;
pub mod schedule;

use std::time::Duration;

use url::Url;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication rejected")]
    AuthFailed,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),
}

/// Join an API method path onto a configured base URL. The base is
/// treated as a directory even when written without a trailing slash, so
/// `https://chat.example.com/api` + `conversations.info` keeps the `/api`
/// segment.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, ClientError> {
    let mut base = base.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join(path)?)
}

// ============================================================================
// Retry plumbing
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send a request, retrying rate limits, server errors, and transport
/// timeouts with exponential backoff. Honors `Retry-After` when present.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, ClientError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(ClientError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status_is_retryable(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "client retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "client retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(ClientError::Http(err));
            }
        }
    }

    Err(ClientError::UnexpectedPayload(
        "request exhausted retries".to_string(),
    ))
}
