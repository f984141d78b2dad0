//! Shared HTTP transport (§4.3). Grounded in the teacher's `HttpClient`
//! builder, extended with the connection-pool tuning, retry-with-backoff,
//! and cancellation awareness the Transport module requires.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};

use super::types::CancelToken;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Builds the process-wide pooled client (§4.3: pooled, keep-alive, bounded
/// idle connections). One `Transport` is shared across extractors and
/// downloaders; callers clone it cheaply (`reqwest::Client` is an `Arc` under
/// the hood).
#[derive(Clone)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Issues `build` (a closure producing a fresh `RequestBuilder` each
    /// attempt, since a `Request` cannot be cloned once it carries a body)
    /// with retry-with-backoff (§4.3, §8): exponential backoff from
    /// `INITIAL_BACKOFF`, capped at `MAX_BACKOFF`, jittered ±25%, up to
    /// `MAX_RETRIES` additional attempts on a retryable status or transient
    /// network error. Aborts early if `cancel` fires mid-sleep.
    pub async fn send_with_retry<F>(
        &self,
        cancel: &CancelToken,
        mut build: F,
    ) -> Result<reqwest::Response, TransportError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let result = build().send().await;
            match result {
                Ok(resp) if !is_retryable_status(resp.status()) || attempt >= MAX_RETRIES => {
                    return Ok(resp);
                }
                Ok(resp) => {
                    tracing::debug!(status = %resp.status(), attempt, "retrying after status");
                }
                Err(err) if attempt >= MAX_RETRIES || !is_retryable_error(&err) => {
                    return Err(TransportError::Request(err));
                }
                Err(err) => {
                    tracing::debug!(error = %err, attempt, "retrying after transport error");
                }
            }
            attempt += 1;
            let backoff = backoff_for(attempt);
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => {
                    return Err(TransportError::Cancelled);
                }
            }
        }
    }
}

/// Errors from [`Transport::send_with_retry`]: either the underlying
/// `reqwest` failure after retries are exhausted, or a cooperative
/// cancellation that interrupted a backoff sleep (§5).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("operation cancelled")]
    Cancelled,
}

fn backoff_for(attempt: u32) -> Duration {
    let base = INITIAL_BACKOFF.saturating_mul(1u32 << attempt.saturating_sub(1).min(8));
    let base = base.min(MAX_BACKOFF);
    let jitter_frac = rand::thread_rng().gen_range(-0.25..=0.25);
    let jittered = base.as_secs_f64() * (1.0 + jitter_frac);
    Duration::from_secs_f64(jittered.max(0.0))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        429 | 500 | 502 | 503 | 504
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=4 {
            // jitter is +/-25%, so compare against the unjittered midpoint
            let samples: Vec<Duration> = (0..20).map(|_| backoff_for(attempt)).collect();
            let max_sample = samples.iter().copied().max().unwrap();
            assert!(max_sample > previous || attempt == 1, "attempt {attempt} did not grow");
            previous = samples.iter().copied().min().unwrap();
        }

        // far past the doubling point, every sample must sit within the
        // jitter band around MAX_BACKOFF.
        for _ in 0..20 {
            let backoff = backoff_for(20);
            assert!(backoff <= MAX_BACKOFF.mul_f64(1.25) + Duration::from_millis(1));
        }
    }

    #[test]
    fn backoff_jitter_stays_within_25_percent_band() {
        for attempt in 1..=3 {
            let base = INITIAL_BACKOFF
                .saturating_mul(1u32 << attempt.saturating_sub(1).min(8))
                .min(MAX_BACKOFF);
            let lower = base.mul_f64(0.75);
            let upper = base.mul_f64(1.25) + Duration::from_millis(1);
            for _ in 0..50 {
                let backoff = backoff_for(attempt);
                assert!(
                    backoff >= lower && backoff <= upper,
                    "attempt {attempt}: {backoff:?} outside [{lower:?}, {upper:?}]"
                );
            }
        }
    }

    #[test]
    fn retryable_status_matches_spec_set() {
        for code in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 403, 404, 410] {
            assert!(!is_retryable_status(StatusCode::from_u16(code).unwrap()));
        }
    }
}
