use crate::chain::Chain;

const SUBSQUID_V2: &str = "https://v2.archive.subsquid.io/network";

/// Subsquid network name for chains that have a public v2 archive.
fn subsquid_network(chain: Chain) -> Option<&'static str> {
    Some(match chain {
        Chain::Arbitrum => "arbitrum-one",
        Chain::Avax => "avalanche-mainnet",
        Chain::Base => "base-mainnet",
        Chain::Bsc => "binance-mainnet",
        Chain::Ethereum => "ethereum-mainnet",
        Chain::Fantom => "fantom-mainnet",
        Chain::Gnosis => "gnosis-mainnet",
        Chain::Linea => "linea-mainnet",
        Chain::Moonbeam => "moonbeam-mainnet",
        Chain::Moonriver => "moonriver-mainnet",
        Chain::Optimism => "optimism-mainnet",
        Chain::Polygon => "polygon-mainnet",
        Chain::Zkevm => "polygon-zkevm-mainnet",
        Chain::Zksync => "zksync-mainnet",
        _ => return None,
    })
}

/// Default archive URL of `chain`, if it has one.
pub fn archive_url(chain: Chain) -> Option<String> {
    subsquid_network(chain).map(|network| format!("{SUBSQUID_V2}/{network}"))
}
