//! The `HttpTransport` trait and the plain `reqwest` transport at the bottom
//! of every pipeline.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request as it travels through the pipeline. Cloned once per attempt.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Signalled by the innermost transport whenever bytes arrive. Set per
    /// attempt by the timeout stage.
    pub activity: Option<Arc<Notify>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
            activity: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
            activity: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Tells the timeout stage the response is still moving.
    pub fn mark_progress(&self) {
        if let Some(activity) = &self.activity {
            activity.notify_one();
        }
    }

    /// Query value by key, mostly useful to fake transports.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
    /// `Location` header, if any.
    pub location: Option<String>,
}

impl HttpResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}

/// One stage of the HTTP pipeline. Every middleware wraps another
/// `HttpTransport`, the innermost one talks to the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(req).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(req).await
    }
}

/// Plain HTTP client. Redirects are left to the response-check stage, which
/// follows them hop by hop through the rate limiter. The read timeout bounds
/// the gap between two reads, not the whole body.
pub struct ReqwestTransport {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("databarn-extract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, read_timeout })
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> TransportError {
        if e.is_builder() {
            TransportError::InvalidRequest {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                ms: self.read_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match req.method {
            Method::Get => self.client.get(&req.url),
            Method::Post => self.client.post(&req.url),
        };
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let mut resp = builder.send().await.map_err(|e| self.map_error(&req.url, e))?;
        req.mark_progress();

        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.map_error(&req.url, e))? {
            req.mark_progress();
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();

        tracing::trace!(url = %url, status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse {
            url,
            status,
            body,
            location,
        })
    }
}
