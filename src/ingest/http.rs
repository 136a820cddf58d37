// src/ingest/http.rs
//! Shared HTTP client for source adapters: user agent, timeouts and bounded
//! retry on rate limiting.

use std::time::Duration;

use metrics::histogram;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde_json::Value;

pub const USER_AGENT: &str = "HyroxWeekly/1.0";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("unauthorized ({status})")]
    Auth { status: u16 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),
}

impl FetchError {
    /// Errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Bounded retry for 429 and timeouts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Exponential backoff, or the server's `Retry-After` when it sent one.
    fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        retry_after.unwrap_or(exp).min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, retry })
    }

    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(Duration::from_secs(15), RetryPolicy::default())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// GET returning the body as text.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let t0 = std::time::Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut req = self.client.get(url).query(query);
            for (k, v) in headers {
                req = req.header(*k, v);
            }

            let outcome = match req.send().await {
                Ok(resp) => classify(resp).await,
                Err(e) => Err(Attempt::from(FetchError::from(e))),
            };

            match outcome {
                Ok(body) => {
                    histogram!("discovery_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                    return Ok(body);
                }
                Err(Attempt { error, retry_after }) => {
                    if !error.is_transient() || attempt > self.retry.max_retries {
                        let error = match error {
                            FetchError::RateLimited { .. } => FetchError::RateLimited { attempts: attempt },
                            other => other,
                        };
                        return Err(error);
                    }
                    let wait = self.retry.delay_for(attempt, retry_after);
                    tracing::warn!(%url, attempt, wait_ms = wait.as_millis() as u64, error = %error, "transient fetch failure, backing off");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// GET returning parsed JSON; a non-JSON body is a parse error.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let body = self.get_text(url, query, headers).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Parse(format!("{url}: {e}")))
    }
}

struct Attempt {
    error: FetchError,
    retry_after: Option<Duration>,
}

impl From<FetchError> for Attempt {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

async fn classify(resp: reqwest::Response) -> Result<String, Attempt> {
    let status = resp.status();
    if status.is_success() {
        return resp.text().await.map_err(|e| Attempt::from(FetchError::from(e)));
    }
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let url = resp.url().to_string();
    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { attempts: 1 },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => FetchError::NotFound(url),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FetchError::Timeout,
        _ => {
            let message: String = resp.text().await.unwrap_or_default().chars().take(200).collect();
            FetchError::Status {
                status: status.as_u16(),
                message,
            }
        }
    };
    Err(Attempt { error, retry_after })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(p.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(p.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(p.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(p.delay_for(4, None), Duration::from_secs(5));
    }

    #[test]
    fn retry_after_wins_but_is_capped() {
        let p = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(7))), Duration::from_secs(7));
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(70))), Duration::from_secs(10));
    }

    #[test]
    fn only_timeouts_and_rate_limits_are_transient() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::RateLimited { attempts: 1 }.is_transient());
        assert!(!FetchError::Auth { status: 401 }.is_transient());
        assert!(!FetchError::Parse("x".into()).is_transient());
    }
}
