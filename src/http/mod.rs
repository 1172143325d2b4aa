//! Composable HTTP transport: response-check ⊃ retry ⊃ rate-limit ⊃ timeout ⊃ transport.

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod response_code;
pub mod retry;
pub mod timeout;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpClient, HttpClientConfig, Stage, PIPELINE_ORDER};
pub use error::TransportError;
pub use retry::RetryConfig;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
