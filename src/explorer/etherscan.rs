use async_trait::async_trait;
use serde::Deserialize;

use super::datetime::from_unix;
use super::{ContractCreationInfo, ContractWatch, ExplorerClient, ExplorerError, ExplorerType};
use crate::http::{HttpClient, HttpRequest};
use crate::serde_util::u64_from_number_or_string;

/// Etherscan and its clones (arbiscan, bscscan, polygonscan, ...). The oldest
/// transaction of a contract is its creation.
pub struct EtherscanClient {
    base_url: String,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct TxListResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxListEntry {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    block_number: u64,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    time_stamp: u64,
}

impl EtherscanClient {
    pub fn new(base_url: String, http: HttpClient) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ExplorerClient for EtherscanClient {
    fn explorer_type(&self) -> ExplorerType {
        ExplorerType::Etherscan
    }

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError> {
        let req = HttpRequest::get(&self.base_url)
            .query("module", "account")
            .query("action", "txlist")
            .query("address", contract.contract_address.to_checksum(None))
            .query("startblock", 1)
            .query("endblock", 999_999_999)
            .query("page", 1)
            .query("offset", 1)
            .query("sort", "asc")
            .query("limit", 1);

        let resp = self.http.send(req).await?;
        let body: TxListResponse = resp
            .json()
            .map_err(|e| ExplorerError::payload(ExplorerType::Etherscan, e))?;

        if body.status != "1" {
            return Err(ExplorerError::Api {
                explorer: ExplorerType::Etherscan,
                message: if body.message.is_empty() {
                    body.result.to_string()
                } else {
                    body.message
                },
            });
        }

        let first = body
            .result
            .as_array()
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| ExplorerError::payload(ExplorerType::Etherscan, "empty result"))?;
        let entry: TxListEntry = serde_json::from_value(first)
            .map_err(|e| ExplorerError::payload(ExplorerType::Etherscan, e))?;

        let block_datetime = from_unix(entry.time_stamp).ok_or_else(|| {
            ExplorerError::payload(
                ExplorerType::Etherscan,
                format!("timestamp {} out of range", entry.time_stamp),
            )
        })?;

        Ok(ContractCreationInfo::new(contract, entry.block_number, block_datetime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::explorer::EXPLORER_EXPECTED_STATUSES;
    use crate::http::testing::FakeTransport;
    use crate::http::{HttpClientConfig, HttpResponse};
    use std::sync::Arc;

    fn watch() -> ContractWatch {
        ContractWatch {
            chain: Chain::Bsc,
            contract_address: "0x0383E88A19E5c387FeBafbF51E5bA642d2ad8bE0".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_parses_first_transaction() {
        let body = r#"{"status":"1","message":"OK","result":[
            {"blockNumber":"28917325","timeStamp":"1686220000","hash":"0xabc"}]}"#;
        let fake = Arc::new(FakeTransport::fixed(200, body));
        let client = EtherscanClient::new(
            "https://api.bscscan.com/api".into(),
            HttpClient::with_transport(fake.clone(), HttpClientConfig::default()),
        );

        let info = client.get_contract_creation_info(&watch()).await.unwrap();
        assert_eq!(info.block_number, 28917325);
        assert_eq!(info.block_datetime.timestamp(), 1686220000);
        assert_eq!(info.chain, Chain::Bsc);

        let req = &fake.requests()[0];
        assert_eq!(req.query_value("action"), Some("txlist"));
        assert_eq!(req.query_value("sort"), Some("asc"));
        assert_eq!(req.query_value("endblock"), Some("999999999"));
    }

    #[tokio::test]
    async fn test_integer_fields_tolerated() {
        let body = r#"{"status":"1","result":[{"blockNumber":12,"timeStamp":1600000000}]}"#;
        let client = EtherscanClient::new(
            "https://x/api".into(),
            HttpClient::with_transport(FakeTransport::fixed(200, body), HttpClientConfig::default()),
        );
        let info = client.get_contract_creation_info(&watch()).await.unwrap();
        assert_eq!(info.block_number, 12);
    }

    #[tokio::test]
    async fn test_status_zero_is_api_error() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        let client = EtherscanClient::new(
            "https://x/api".into(),
            HttpClient::with_transport(FakeTransport::fixed(200, body), HttpClientConfig::default()),
        );
        let err = client.get_contract_creation_info(&watch()).await.unwrap_err();
        match err {
            ExplorerError::Api { message, .. } => assert_eq!(message, "NOTOK"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redirect_leads_to_payload() {
        let body = r#"{"status":"1","message":"OK","result":[{"blockNumber":"100","timeStamp":"1600000000"}]}"#;
        let fake = Arc::new(FakeTransport::new(move |req| {
            Ok(match req.url.as_str() {
                "https://api.bscscan.com/api" => {
                    HttpResponse::new(req.url.clone(), 301, "").with_location("/v2/api?chainid=56")
                }
                "https://api.bscscan.com/v2/api?chainid=56" => HttpResponse::new(req.url.clone(), 200, body),
                _ => HttpResponse::new(req.url.clone(), 404, ""),
            })
        }));
        let config = HttpClientConfig::default().with_expected_statuses(EXPLORER_EXPECTED_STATUSES);
        let client = EtherscanClient::new(
            "https://api.bscscan.com/api".into(),
            HttpClient::with_transport(fake.clone(), config),
        );

        let info = client.get_contract_creation_info(&watch()).await.unwrap();
        assert_eq!(info.block_number, 100);
        assert_eq!(fake.count(), 2);
    }
}
