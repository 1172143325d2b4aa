//! Client and wire models for the subsquid v2 log archive.
//!
//! A crawl page is three requests: the archive height, the worker shard
//! serving a given start block, and the log query POSTed to that worker.

use alloy::primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{HttpClient, TransportError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected archive payload from {url}: {reason}")]
    Payload { url: String, reason: String },
}

// ============================================================
// Response models
// ============================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveBlockHeader {
    pub number: u64,
    /// Unix seconds. Some archives render it as a float.
    pub timestamp: f64,
}

impl ArchiveBlockHeader {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return None;
        }
        DateTime::from_timestamp(self.timestamp.trunc() as i64, 0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveTransaction {
    pub transaction_index: u64,
    /// Receipt status, `0` for a reverted transaction.
    #[serde(default)]
    pub status: Option<u64>,
}

impl ArchiveTransaction {
    pub fn reverted(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveLog {
    pub log_index: u64,
    pub transaction_index: u64,
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
    pub transaction_hash: B256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveBlock {
    pub header: ArchiveBlockHeader,
    #[serde(default)]
    pub transactions: Vec<ArchiveTransaction>,
    #[serde(default)]
    pub logs: Vec<ArchiveLog>,
}

// ============================================================
// Query
// ============================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockFields {
    timestamp: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogFields {
    address: bool,
    data: bool,
    topics: bool,
    transaction_hash: bool,
}

#[derive(Debug, Clone, Serialize)]
struct TransactionFields {
    status: bool,
}

#[derive(Debug, Clone, Serialize)]
struct QueryFields {
    block: BlockFields,
    log: LogFields,
    transaction: TransactionFields,
}

impl Default for QueryFields {
    fn default() -> Self {
        Self {
            block: BlockFields { timestamp: true },
            log: LogFields {
                address: true,
                data: true,
                topics: true,
                transaction_hash: true,
            },
            transaction: TransactionFields { status: true },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRequest {
    pub address: Vec<String>,
    pub topic0: Vec<String>,
    pub transaction: bool,
}

/// Body POSTed to a worker shard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveQuery {
    pub from_block: u64,
    pub to_block: u64,
    fields: QueryFields,
    pub logs: Vec<LogRequest>,
}

fn lower_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

impl ArchiveQuery {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            fields: QueryFields::default(),
            logs: Vec::new(),
        }
    }

    /// Selects logs emitted by `address` whose topic0 is one of `topics`.
    /// Archives match addresses and topics in lowercase.
    pub fn with_logs(mut self, address: Address, topics: impl IntoIterator<Item = B256>) -> Self {
        self.logs.push(LogRequest {
            address: vec![lower_hex(address)],
            topic0: topics.into_iter().map(lower_hex).collect(),
            transaction: true,
        });
        self
    }
}

// ============================================================
// Client
// ============================================================

#[derive(Clone)]
pub struct ArchiveClient {
    base_url: String,
    http: HttpClient,
}

impl ArchiveClient {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Highest block the archive has ingested.
    pub async fn height(&self) -> Result<u64, ArchiveError> {
        let url = format!("{}/height", self.base_url);
        let resp = self.http.get(url.clone()).await?;
        resp.text()
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ArchiveError::Payload {
                url,
                reason: format!("bad height '{}': {}", resp.text().trim(), e),
            })
    }

    /// URL of the worker shard serving blocks from `from_block`.
    pub async fn worker_url(&self, from_block: u64) -> Result<String, ArchiveError> {
        let url = format!("{}/{}/worker", self.base_url, from_block);
        let resp = self.http.get(url.clone()).await?;
        let worker = resp.text().trim();
        if worker.is_empty() {
            return Err(ArchiveError::Payload {
                url,
                reason: "empty worker url".to_string(),
            });
        }
        Ok(worker.to_string())
    }

    pub async fn query(&self, worker_url: &str, query: &ArchiveQuery) -> Result<Vec<ArchiveBlock>, ArchiveError> {
        let body = serde_json::to_value(query).map_err(|e| ArchiveError::Payload {
            url: worker_url.to_string(),
            reason: e.to_string(),
        })?;
        self.http
            .post_json(worker_url, body)
            .await?
            .json()
            .map_err(|e| ArchiveError::Payload {
                url: worker_url.to_string(),
                reason: e.to_string(),
            })
    }
}
