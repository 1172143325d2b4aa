use async_trait::async_trait;
use serde::Deserialize;

use super::datetime::parse_utc;
use super::{ContractCreationInfo, ContractWatch, ExplorerClient, ExplorerError, ExplorerType};
use crate::http::HttpClient;
use crate::serde_util::u64_from_number_or_string;

/// Blockscout deployments exposing the JSON `/v2` API.
pub struct BlockscoutV2Client {
    base_url: String,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    creation_tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionInfo {
    #[serde(alias = "block_number", deserialize_with = "u64_from_number_or_string")]
    block: u64,
    timestamp: String,
}

const EXPLORER: ExplorerType = ExplorerType::BlockscoutV2;

impl BlockscoutV2Client {
    pub fn new(base_url: String, http: HttpClient) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ExplorerClient for BlockscoutV2Client {
    fn explorer_type(&self) -> ExplorerType {
        EXPLORER
    }

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError> {
        let address_url = format!(
            "{}/v2/addresses/{}",
            self.base_url,
            contract.contract_address.to_checksum(None)
        );
        let address: AddressInfo = self
            .http
            .get(address_url)
            .await?
            .json()
            .map_err(|e| ExplorerError::payload(EXPLORER, e))?;
        let tx_hash = address
            .creation_tx_hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ExplorerError::payload(EXPLORER, "creation_tx_hash missing"))?;

        let tx: TransactionInfo = self
            .http
            .get(format!("{}/v2/transactions/{}", self.base_url, tx_hash))
            .await?
            .json()
            .map_err(|e| ExplorerError::payload(EXPLORER, e))?;
        let block_datetime = parse_utc(&tx.timestamp)
            .ok_or_else(|| ExplorerError::payload(EXPLORER, format!("bad timestamp '{}'", tx.timestamp)))?;

        Ok(ContractCreationInfo::new(contract, tx.block, block_datetime))
    }
}
