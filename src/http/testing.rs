//! In-memory transport used by unit tests across the crate.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::error::TransportError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// Answers every request through a closure and records what it saw,
/// together with the (tokio) instant each request arrived.
pub struct FakeTransport {
    responder: Responder,
    delay: Option<Duration>,
    chunks: Option<(u32, Duration)>,
    seen: Mutex<Vec<(tokio::time::Instant, HttpRequest)>>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            chunks: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `status` with `body`.
    pub fn fixed(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |req| Ok(HttpResponse::new(req.url.clone(), status, body.clone())))
    }

    /// Routes on URL suffix: the first `(suffix, status, body)` whose suffix
    /// matches the request URL wins; unmatched URLs answer 404.
    pub fn routes(routes: Vec<(&str, u16, &str)>) -> Self {
        let routes: Vec<(String, u16, String)> = routes
            .into_iter()
            .map(|(s, code, b)| (s.to_string(), code, b.to_string()))
            .collect();
        Self::new(move |req| {
            let hit = routes.iter().find(|(suffix, _, _)| req.url.ends_with(suffix));
            Ok(match hit {
                Some((_, code, body)) => HttpResponse::new(req.url.clone(), *code, body.clone()),
                None => HttpResponse::new(req.url.clone(), 404, "not found"),
            })
        })
    }

    /// Streams the body as `count` reads, `interval` apart. Runs before any
    /// `with_delay` stall.
    pub fn with_chunks(mut self, count: u32, interval: Duration) -> Self {
        self.chunks = Some((count, interval));
        self
    }

    /// Sleeps `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn arrivals(&self) -> Vec<tokio::time::Instant> {
        self.seen.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen
            .lock()
            .unwrap()
            .push((tokio::time::Instant::now(), req.clone()));
        if let Some((count, interval)) = self.chunks {
            for _ in 0..count {
                tokio::time::sleep(interval).await;
                req.mark_progress();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&req)
    }
}
