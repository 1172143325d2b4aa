use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every network the databarn tracks. The watch list, explorer registry and
/// archive map are all keyed by this enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Arbitrum,
    Aurora,
    Avax,
    Base,
    Bsc,
    Canto,
    Celo,
    Cronos,
    Emerald,
    Ethereum,
    Fantom,
    Fuse,
    Gnosis,
    One,
    Heco,
    Kava,
    Linea,
    Mantle,
    Metis,
    Moonbeam,
    Moonriver,
    Optimism,
    Polygon,
    Rollux,
    Scroll,
    Zkevm,
    Zksync,
}

impl Chain {
    pub const ALL: [Chain; 27] = [
        Chain::Arbitrum,
        Chain::Aurora,
        Chain::Avax,
        Chain::Base,
        Chain::Bsc,
        Chain::Canto,
        Chain::Celo,
        Chain::Cronos,
        Chain::Emerald,
        Chain::Ethereum,
        Chain::Fantom,
        Chain::Fuse,
        Chain::Gnosis,
        Chain::One,
        Chain::Heco,
        Chain::Kava,
        Chain::Linea,
        Chain::Mantle,
        Chain::Metis,
        Chain::Moonbeam,
        Chain::Moonriver,
        Chain::Optimism,
        Chain::Polygon,
        Chain::Rollux,
        Chain::Scroll,
        Chain::Zkevm,
        Chain::Zksync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Arbitrum => "arbitrum",
            Chain::Aurora => "aurora",
            Chain::Avax => "avax",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
            Chain::Canto => "canto",
            Chain::Celo => "celo",
            Chain::Cronos => "cronos",
            Chain::Emerald => "emerald",
            Chain::Ethereum => "ethereum",
            Chain::Fantom => "fantom",
            Chain::Fuse => "fuse",
            Chain::Gnosis => "gnosis",
            Chain::One => "one",
            Chain::Heco => "heco",
            Chain::Kava => "kava",
            Chain::Linea => "linea",
            Chain::Mantle => "mantle",
            Chain::Metis => "metis",
            Chain::Moonbeam => "moonbeam",
            Chain::Moonriver => "moonriver",
            Chain::Optimism => "optimism",
            Chain::Polygon => "polygon",
            Chain::Rollux => "rollux",
            Chain::Scroll => "scroll",
            Chain::Zkevm => "zkevm",
            Chain::Zksync => "zksync",
        }
    }

    /// EVM chain id (EIP-155).
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Arbitrum => 42161,
            Chain::Aurora => 1313161554,
            Chain::Avax => 43114,
            Chain::Base => 8453,
            Chain::Bsc => 56,
            Chain::Canto => 7700,
            Chain::Celo => 42220,
            Chain::Cronos => 25,
            Chain::Emerald => 42262,
            Chain::Ethereum => 1,
            Chain::Fantom => 250,
            Chain::Fuse => 122,
            Chain::Gnosis => 100,
            Chain::One => 1666600000,
            Chain::Heco => 128,
            Chain::Kava => 2222,
            Chain::Linea => 59144,
            Chain::Mantle => 5000,
            Chain::Metis => 1088,
            Chain::Moonbeam => 1284,
            Chain::Moonriver => 1285,
            Chain::Optimism => 10,
            Chain::Polygon => 137,
            Chain::Rollux => 570,
            Chain::Scroll => 534352,
            Chain::Zkevm => 1101,
            Chain::Zksync => 324,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown chain '{0}'")]
pub struct UnknownChain(pub String);

impl FromStr for Chain {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownChain(s.to_string()))
    }
}
