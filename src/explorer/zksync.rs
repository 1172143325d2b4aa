use async_trait::async_trait;
use serde::Deserialize;

use super::datetime::parse_utc;
use super::{ContractCreationInfo, ContractWatch, ExplorerClient, ExplorerError, ExplorerType};
use crate::http::HttpClient;
use crate::serde_util::u64_from_number_or_string;

pub struct ZksyncClient {
    base_url: String,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressInfo {
    creator_tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInfo {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    block_number: u64,
    received_at: String,
}

const EXPLORER: ExplorerType = ExplorerType::Zksync;

impl ZksyncClient {
    pub fn new(base_url: String, http: HttpClient) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ExplorerClient for ZksyncClient {
    fn explorer_type(&self) -> ExplorerType {
        EXPLORER
    }

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError> {
        let address: AddressInfo = self
            .http
            .get(format!(
                "{}/address/{}",
                self.base_url,
                contract.contract_address.to_checksum(None)
            ))
            .await?
            .json()
            .map_err(|e| ExplorerError::payload(EXPLORER, e))?;
        let tx_hash = address
            .creator_tx_hash
            .ok_or_else(|| ExplorerError::payload(EXPLORER, "creatorTxHash missing"))?;

        let tx: TransactionInfo = self
            .http
            .get(format!("{}/transactions/{}", self.base_url, tx_hash))
            .await?
            .json()
            .map_err(|e| ExplorerError::payload(EXPLORER, e))?;
        let block_datetime = parse_utc(&tx.received_at).ok_or_else(|| {
            ExplorerError::payload(EXPLORER, format!("bad receivedAt '{}'", tx.received_at))
        })?;

        Ok(ContractCreationInfo::new(contract, tx.block_number, block_datetime))
    }
}
