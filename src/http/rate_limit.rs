//! Minimum-interval rate limiter.
//!
//! Unlike a token bucket this never bursts: two consecutive requests through
//! the same instance are always at least `min_interval` apart. Callers are
//! delayed, never rejected.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::error::TransportError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

pub struct RateLimited<T> {
    inner: T,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl<T> RateLimited<T> {
    pub fn new(inner: T, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the interval since the previous request has elapsed, then
    /// stamp the current instant. The lock is held across the sleep so
    /// concurrent callers queue up behind each other.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Rate limiter sleeping"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RateLimited<T> {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.acquire().await;
        self.inner.send(req).await
    }
}
