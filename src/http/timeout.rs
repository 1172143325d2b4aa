use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::error::TransportError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Bounds a single attempt by inactivity. The first bytes must arrive within
/// the connect and read budgets combined; after that, each gap between two
/// reads may last up to the read budget, however long the whole body takes.
pub struct TimeoutTransport<T> {
    inner: T,
    connect: Duration,
    read: Duration,
}

impl<T> TimeoutTransport<T> {
    pub fn new(inner: T, connect: Duration, read: Duration) -> Self {
        Self {
            inner,
            connect,
            read,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for TimeoutTransport<T> {
    async fn send(&self, mut req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = req.url.clone();
        let activity = Arc::new(Notify::new());
        req.activity = Some(activity.clone());

        let response = self.inner.send(req);
        tokio::pin!(response);

        let mut budget = self.connect + self.read;
        loop {
            tokio::select! {
                biased;
                result = &mut response => return result,
                _ = activity.notified() => budget = self.read,
                _ = tokio::time::sleep(budget) => {
                    return Err(TransportError::Timeout {
                        url,
                        ms: budget.as_millis() as u64,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeTransport;

    fn bounded(fake: FakeTransport) -> TimeoutTransport<FakeTransport> {
        TimeoutTransport::new(fake, Duration::from_secs(5), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_times_out() {
        let slow = FakeTransport::fixed(200, "{}").with_delay(Duration::from_secs(60));

        let err = bounded(slow).send(HttpRequest::get("http://slow")).await.unwrap_err();
        match err {
            TransportError::Timeout { ms, .. } => assert_eq!(ms, 15_000),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_response_passes_through() {
        let fast = FakeTransport::fixed(200, "ok").with_delay(Duration::from_secs(1));

        let resp = bounded(fast).send(HttpRequest::get("http://fast")).await.unwrap();
        assert_eq!(resp.text(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_body_outlives_the_budgets() {
        // Eight reads, 5s apart: 40s in total, never 10s without bytes.
        let streaming = FakeTransport::fixed(200, "[]").with_chunks(8, Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let resp = bounded(streaming).send(HttpRequest::get("http://worker")).await.unwrap();
        assert_eq!(resp.text(), "[]");
        assert!(start.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_after_first_bytes_uses_read_budget() {
        let stalled = FakeTransport::fixed(200, "[]")
            .with_chunks(2, Duration::from_secs(5))
            .with_delay(Duration::from_secs(60));

        let err = bounded(stalled).send(HttpRequest::get("http://worker")).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { ms: 10_000, .. }));
    }
}
