//! Block-explorer clients: one adapter per explorer family, selected per chain.

pub mod blockscout;
pub mod blockscout_html;
pub mod datetime;
pub mod etherscan;
pub mod registry;
pub mod routescan;
pub mod scrape;
pub mod types;
pub mod zksync;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::chain::Chain;
use crate::http::{HttpClient, HttpClientConfig, HttpTransport, ReqwestTransport, TransportError};

pub use registry::{explorer_config, ExplorerConfig, ExplorerType};
pub use scrape::ScrapeError;
pub use types::{ContractCreationInfo, ContractWatch};

/// Redirects are followed; a redirect without a `Location` is accepted as is.
pub const EXPLORER_EXPECTED_STATUSES: &[u16] = &[200, 301, 302];
/// Explorers are slow to recover, back off harder than the default.
pub const EXPLORER_BACKOFF_FACTOR: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{explorer} returned an unexpected payload: {reason}")]
    Payload {
        explorer: ExplorerType,
        reason: String,
    },

    #[error("{explorer} API error: {message}")]
    Api {
        explorer: ExplorerType,
        message: String,
    },

    #[error("failed to scrape {explorer} page: {source}")]
    Scrape {
        explorer: ExplorerType,
        #[source]
        source: ScrapeError,
    },

    #[error("explorer type {0} has no client")]
    Unsupported(ExplorerType),
}

impl ExplorerError {
    pub(crate) fn payload(explorer: ExplorerType, reason: impl ToString) -> Self {
        Self::Payload {
            explorer,
            reason: reason.to_string(),
        }
    }
}

/// Resolves the creation block of a contract against one explorer.
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    fn explorer_type(&self) -> ExplorerType;

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError>;
}

/// HTTP settings for an explorer: its own interval and read timeout on top of
/// the process-wide base, explorer backoff, redirects accepted.
pub fn explorer_http_config(explorer: &ExplorerConfig, base: &HttpClientConfig) -> HttpClientConfig {
    let mut cfg = base
        .clone()
        .with_min_interval(Duration::from_secs(explorer.min_seconds_between_requests))
        .with_backoff_factor(EXPLORER_BACKOFF_FACTOR)
        .with_expected_statuses(EXPLORER_EXPECTED_STATUSES);
    cfg.read_timeout = Duration::from_secs(explorer.read_timeout_secs);
    cfg
}

/// Builds the client for `explorer` over a fresh connection pool.
pub fn resolve(
    explorer: &ExplorerConfig,
    base: &HttpClientConfig,
) -> Result<Box<dyn ExplorerClient>, ExplorerError> {
    let read_timeout = explorer_http_config(explorer, base).read_timeout;
    let transport = ReqwestTransport::new(base.connect_timeout, read_timeout)?;
    resolve_with_transport(explorer, transport, base)
}

/// Builds the client for `explorer` over an arbitrary transport.
pub fn resolve_with_transport<T: HttpTransport + 'static>(
    explorer: &ExplorerConfig,
    transport: T,
    base: &HttpClientConfig,
) -> Result<Box<dyn ExplorerClient>, ExplorerError> {
    let client = |http_cfg| HttpClient::with_transport(transport, http_cfg);
    let http_cfg = explorer_http_config(explorer, base);
    let base_url = explorer.base_url.clone();

    let resolved: Box<dyn ExplorerClient> = match explorer.explorer_type {
        ExplorerType::Etherscan => Box::new(etherscan::EtherscanClient::new(base_url, client(http_cfg))),
        ExplorerType::Routescan => Box::new(routescan::RoutescanClient::new(base_url, client(http_cfg))),
        ExplorerType::BlockscoutV2 => {
            Box::new(blockscout::BlockscoutV2Client::new(base_url, client(http_cfg)))
        }
        ExplorerType::BlockscoutTrxListApi => Box::new(
            blockscout_html::TransactionListClient::new(base_url, client(http_cfg)),
        ),
        ExplorerType::Blockscout => {
            Box::new(blockscout_html::BlockscoutHtmlClient::new(base_url, client(http_cfg)))
        }
        ExplorerType::Zksync => Box::new(zksync::ZksyncClient::new(base_url, client(http_cfg))),
        unsupported @ ExplorerType::Harmony => return Err(ExplorerError::Unsupported(unsupported)),
    };

    tracing::debug!(
        chain = %explorer.chain,
        explorer = %explorer.explorer_type,
        url = %explorer.base_url,
        min_interval_secs = explorer.min_seconds_between_requests,
        "Explorer client ready"
    );
    Ok(resolved)
}
