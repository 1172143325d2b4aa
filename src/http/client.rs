//! Assembles the middleware stages into one client.

use std::sync::Arc;
use std::time::Duration;

use super::error::TransportError;
use super::rate_limit::RateLimited;
use super::response_code::ResponseCheck;
use super::retry::{RetryConfig, RetryTransport};
use super::timeout::TimeoutTransport;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// One layer of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResponseCheck,
    Retry,
    RateLimit,
    Timeout,
    Transport,
}

/// Outermost first. `HttpClient::build` nests the stages in exactly this order.
pub const PIPELINE_ORDER: [Stage; 5] = [
    Stage::ResponseCheck,
    Stage::Retry,
    Stage::RateLimit,
    Stage::Timeout,
    Stage::Transport,
];

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub min_interval: Duration,
    pub retry: RetryConfig,
    pub expected_statuses: Vec<u16>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            min_interval: Duration::ZERO,
            retry: RetryConfig::default(),
            expected_statuses: vec![200],
        }
    }
}

impl HttpClientConfig {
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.retry.backoff_factor = factor;
        self
    }

    pub fn with_expected_statuses(mut self, statuses: &[u16]) -> Self {
        self.expected_statuses = statuses.to_vec();
        self
    }
}

type Pipeline<T> = ResponseCheck<RetryTransport<RateLimited<TimeoutTransport<T>>>>;

/// HTTP client owned by exactly one worker. Rate-limiter state lives inside,
/// so two clients never share an interval.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<dyn HttpTransport>,
}

impl HttpClient {
    /// Client backed by a real `reqwest` connection pool.
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.connect_timeout, config.read_timeout)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Client over an arbitrary innermost transport.
    pub fn with_transport<T: HttpTransport + 'static>(transport: T, config: HttpClientConfig) -> Self {
        Self {
            inner: Arc::new(Self::build(transport, config)),
        }
    }

    fn build<T: HttpTransport>(transport: T, config: HttpClientConfig) -> Pipeline<T> {
        let timeout = TimeoutTransport::new(transport, config.connect_timeout, config.read_timeout);
        let limited = RateLimited::new(timeout, config.min_interval);
        let retry = RetryTransport::new(limited, config.retry);
        ResponseCheck::new(retry, config.expected_statuses)
    }

    #[cfg(test)]
    pub(crate) fn stages(&self) -> &'static [Stage] {
        &PIPELINE_ORDER
    }

    pub async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.inner.send(req).await
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::get(url)).await
    }

    pub async fn post_json(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::post_json(url, body)).await
    }
}
