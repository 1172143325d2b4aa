use async_trait::async_trait;
use serde::Deserialize;

use super::datetime::parse_utc;
use super::{ContractCreationInfo, ContractWatch, ExplorerClient, ExplorerError, ExplorerType};
use crate::chain::Chain;
use crate::http::{HttpClient, HttpRequest};
use crate::serde_util::u64_from_number_or_string;

pub struct RoutescanClient {
    base_url: String,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct TransactionsPage {
    #[serde(default)]
    items: Vec<RoutescanTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutescanTransaction {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    block_number: u64,
    timestamp: String,
}

/// Routescan groups chains by ecosystem name.
fn ecosystem(chain: Chain) -> &'static str {
    match chain {
        Chain::Avax => "avalanche",
        other => other.as_str(),
    }
}

impl RoutescanClient {
    pub fn new(base_url: String, http: HttpClient) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ExplorerClient for RoutescanClient {
    fn explorer_type(&self) -> ExplorerType {
        ExplorerType::Routescan
    }

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError> {
        let chain_id = contract.chain.chain_id();
        let url = format!(
            "{}/v2/network/mainnet/evm/{}/address/{}/transactions",
            self.base_url,
            chain_id,
            contract.contract_address.to_checksum(None)
        );
        let req = HttpRequest::get(url)
            .query("ecosystem", ecosystem(contract.chain))
            .query("includedChainIds", chain_id)
            .query("categories", "evm_tx")
            .query("sort", "asc")
            .query("limit", 1);

        let page: TransactionsPage = self
            .http
            .send(req)
            .await?
            .json()
            .map_err(|e| ExplorerError::payload(ExplorerType::Routescan, e))?;

        let first = page
            .items
            .first()
            .ok_or_else(|| ExplorerError::payload(ExplorerType::Routescan, "no transactions"))?;
        let block_datetime = parse_utc(&first.timestamp).ok_or_else(|| {
            ExplorerError::payload(
                ExplorerType::Routescan,
                format!("bad timestamp '{}'", first.timestamp),
            )
        })?;

        Ok(ContractCreationInfo::new(contract, first.block_number, block_datetime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeTransport;
    use crate::http::HttpClientConfig;
    use std::sync::Arc;

    fn watch() -> ContractWatch {
        ContractWatch {
            chain: Chain::Avax,
            contract_address: "0x595786A3848B1de66C6056C87BA91977935fBC46".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_first_item_is_creation() {
        let body = r#"{"items":[{"blockNumber":21034525,"timestamp":"2022-10-10T08:45:04.000Z","id":"x"}],"link":{}}"#;
        let fake = Arc::new(FakeTransport::fixed(200, body));
        let client = RoutescanClient::new(
            "https://api.routescan.io".into(),
            HttpClient::with_transport(fake.clone(), HttpClientConfig::default()),
        );

        let info = client.get_contract_creation_info(&watch()).await.unwrap();
        assert_eq!(info.block_number, 21034525);
        assert_eq!(info.block_datetime.to_rfc3339(), "2022-10-10T08:45:04+00:00");

        let req = &fake.requests()[0];
        assert!(req.url.ends_with(
            "/v2/network/mainnet/evm/43114/address/0x595786A3848B1de66C6056C87BA91977935fBC46/transactions"
        ));
        assert_eq!(req.query_value("ecosystem"), Some("avalanche"));
        assert_eq!(req.query_value("includedChainIds"), Some("43114"));
    }

    #[tokio::test]
    async fn test_empty_items_is_error() {
        let client = RoutescanClient::new(
            "https://api.routescan.io".into(),
            HttpClient::with_transport(FakeTransport::fixed(200, r#"{"items":[]}"#), HttpClientConfig::default()),
        );
        let err = client.get_contract_creation_info(&watch()).await.unwrap_err();
        assert!(matches!(err, ExplorerError::Payload { .. }));
    }
}
