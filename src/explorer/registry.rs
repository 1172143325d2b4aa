use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::Chain;

/// Explorer API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExplorerType {
    Etherscan,
    Routescan,
    BlockscoutV2,
    BlockscoutTrxListApi,
    Blockscout,
    Zksync,
    Harmony,
}

impl ExplorerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplorerType::Etherscan => "etherscan",
            ExplorerType::Routescan => "routescan",
            ExplorerType::BlockscoutV2 => "blockscout-v2",
            ExplorerType::BlockscoutTrxListApi => "blockscout-trx-list-api",
            ExplorerType::Blockscout => "blockscout",
            ExplorerType::Zksync => "zksync",
            ExplorerType::Harmony => "harmony",
        }
    }
}

impl fmt::Display for ExplorerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_MIN_SECONDS_BETWEEN_REQUESTS: u64 = 10;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub chain: Chain,
    pub explorer_type: ExplorerType,
    /// Without trailing slash.
    pub base_url: String,
    pub min_seconds_between_requests: u64,
    pub read_timeout_secs: u64,
}

impl ExplorerConfig {
    fn new(chain: Chain, explorer_type: ExplorerType, base_url: &str) -> Self {
        Self {
            chain,
            explorer_type,
            base_url: base_url.trim_end_matches('/').to_string(),
            min_seconds_between_requests: DEFAULT_MIN_SECONDS_BETWEEN_REQUESTS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }

    fn read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }
}

/// Built-in explorer for a chain. Every chain has one; some point at an
/// explorer family without a client (see `ExplorerError::Unsupported`).
pub fn explorer_config(chain: Chain) -> ExplorerConfig {
    use ExplorerType::*;

    match chain {
        Chain::Arbitrum => ExplorerConfig::new(chain, Etherscan, "https://api.arbiscan.io/api"),
        Chain::Aurora => ExplorerConfig::new(chain, BlockscoutV2, "https://old.explorer.aurora.dev/api"),
        Chain::Avax => ExplorerConfig::new(chain, Routescan, "https://api.routescan.io"),
        Chain::Base => ExplorerConfig::new(chain, Etherscan, "https://api.basescan.org/api"),
        Chain::Bsc => ExplorerConfig::new(chain, Etherscan, "https://api.bscscan.com/api"),
        Chain::Canto => ExplorerConfig::new(chain, BlockscoutV2, "https://explorer.plexnode.wtf/api"),
        Chain::Celo => ExplorerConfig::new(chain, Blockscout, "https://explorer.celo.org"),
        Chain::Cronos => ExplorerConfig::new(chain, Etherscan, "https://api.cronoscan.com/api"),
        Chain::Emerald => ExplorerConfig::new(chain, Blockscout, "https://explorer.emerald.oasis.dev/"),
        Chain::Ethereum => ExplorerConfig::new(chain, Etherscan, "https://api.etherscan.io/api"),
        Chain::Fantom => ExplorerConfig::new(chain, Etherscan, "https://api.ftmscan.com/api"),
        Chain::Fuse => ExplorerConfig::new(chain, BlockscoutV2, "https://explorer.fuse.io/api"),
        Chain::Gnosis => ExplorerConfig::new(chain, Etherscan, "https://api.gnosisscan.io/api"),
        Chain::One => ExplorerConfig::new(chain, Harmony, "https://explorer.harmony.one/"),
        Chain::Heco => ExplorerConfig::new(chain, Etherscan, "https://api.hecoinfo.com/api"),
        Chain::Kava => ExplorerConfig::new(chain, Blockscout, "https://kavascan.com"),
        Chain::Linea => ExplorerConfig::new(chain, BlockscoutTrxListApi, "https://explorer.linea.build"),
        Chain::Mantle => {
            ExplorerConfig::new(chain, Blockscout, "https://explorer.mantle.xyz").read_timeout(30)
        }
        Chain::Metis => ExplorerConfig::new(chain, Blockscout, "https://andromeda-explorer.metis.io"),
        Chain::Moonbeam => ExplorerConfig::new(chain, Etherscan, "https://api-moonbeam.moonscan.io/api"),
        Chain::Moonriver => ExplorerConfig::new(chain, Etherscan, "https://api-moonriver.moonscan.io/api"),
        Chain::Optimism => ExplorerConfig::new(chain, Etherscan, "https://api-optimistic.etherscan.io/api"),
        Chain::Polygon => ExplorerConfig::new(chain, Etherscan, "https://api.polygonscan.com/api"),
        Chain::Rollux => ExplorerConfig::new(chain, BlockscoutTrxListApi, "https://explorer.rollux.com"),
        Chain::Scroll => ExplorerConfig::new(chain, Etherscan, "https://api.scrollscan.com/api"),
        Chain::Zkevm => ExplorerConfig::new(chain, Etherscan, "https://api-zkevm.polygonscan.com/api"),
        Chain::Zksync => {
            ExplorerConfig::new(chain, Zksync, "https://block-explorer-api.mainnet.zksync.io")
        }
    }
}
