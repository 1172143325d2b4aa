//! Transport-level error types.

use thiserror::Error;

/// Errors surfaced by the HTTP pipeline.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure and similar.
    #[error("request to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    /// A single attempt waited longer than its budget for the next bytes.
    #[error("request to {url} timed out after {ms}ms")]
    Timeout { url: String, ms: u64 },

    /// Final status code is outside the expected set.
    #[error("unexpected status {status} from {url}, expected one of {expected:?}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        expected: Vec<u16>,
    },

    /// Server answered with a status the retry stage treats as transient.
    #[error("server at {url} answered {status}")]
    RetryableStatus { url: String, status: u16 },

    /// Every attempt failed with a retryable error.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<TransportError>,
    },

    /// A redirect chain that is too long or points nowhere valid.
    #[error("cannot follow redirect from {url}: {reason}")]
    Redirect { url: String, reason: String },

    /// The request could not be built (bad URL, unserializable body).
    #[error("invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

impl TransportError {
    /// Connection-level failures, timeouts and gateway errors are worth
    /// another attempt. Anything else (4xx, bad request) is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::RetryableStatus { .. }
        )
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Connection { url, .. }
            | Self::Timeout { url, .. }
            | Self::UnexpectedStatus { url, .. }
            | Self::RetryableStatus { url, .. }
            | Self::RetriesExhausted { url, .. }
            | Self::Redirect { url, .. }
            | Self::InvalidRequest { url, .. } => url,
        }
    }
}
