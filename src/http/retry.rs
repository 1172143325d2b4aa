//! Bounded exponential-backoff retry.

use async_trait::async_trait;
use std::time::Duration;

use super::error::TransportError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base of the backoff: the wait after the n-th failure is
    /// `backoff_factor * 2^(n-1)`.
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    /// Statuses treated as transient.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: Duration::from_millis(500),
            max_backoff: Duration::from_secs(120),
            retry_statuses: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Delay after the `failures`-th failed attempt (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        let delay = self.backoff_factor.saturating_mul(1u32 << exp);
        delay.min(self.max_backoff)
    }
}

pub struct RetryTransport<T> {
    inner: T,
    config: RetryConfig,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RetryTransport<T> {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match self.inner.send(req.clone()).await {
                Ok(resp) if self.config.retry_statuses.contains(&resp.status) => {
                    Err(TransportError::RetryableStatus {
                        url: req.url.clone(),
                        status: resp.status,
                    })
                }
                other => other,
            };

            let err = match outcome {
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                tracing::warn!(url = %req.url, attempts = attempt, error = %err, "Retries exhausted");
                return Err(TransportError::RetriesExhausted {
                    url: req.url.clone(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.config.backoff(attempt);
            tracing::debug!(
                url = %req.url,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeTransport;
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_from_factor() {
        let cfg = RetryConfig {
            backoff_factor: Duration::from_secs(5),
            ..RetryConfig::default()
        };
        assert_eq!(cfg.backoff(1), Duration::from_secs(5));
        assert_eq!(cfg.backoff(2), Duration::from_secs(10));
        assert_eq!(cfg.backoff(3), Duration::from_secs(20));
    }

    #[test]
    fn test_backoff_capped() {
        let cfg = RetryConfig {
            backoff_factor: Duration::from_secs(60),
            max_backoff: Duration::from_secs(90),
            ..RetryConfig::default()
        };
        assert_eq!(cfg.backoff(4), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_503_stops_after_three_attempts() {
        let fake = Arc::new(FakeTransport::fixed(503, "busy"));
        let retry = RetryTransport::new(fake.clone(), RetryConfig::default());

        let err = retry.send(HttpRequest::get("http://down")).await.unwrap_err();
        assert_eq!(fake.count(), 3);
        match err {
            TransportError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, TransportError::RetryableStatus { status: 503, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let fake = Arc::new(FakeTransport::fixed(404, "nope"));
        let retry = RetryTransport::new(fake.clone(), RetryConfig::default());

        let resp = retry.send(HttpRequest::get("http://missing")).await.unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(fake.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let fake = FakeTransport::new(move |req| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Err(TransportError::Connection {
                    url: req.url.clone(),
                    reason: "reset".into(),
                })
            } else {
                Ok(HttpResponse::new(req.url.clone(), 200, "ok"))
            }
        });
        let retry = RetryTransport::new(fake, RetryConfig::default());

        let resp = retry.send(HttpRequest::get("http://flaky")).await.unwrap();
        assert_eq!(resp.text(), "ok");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
