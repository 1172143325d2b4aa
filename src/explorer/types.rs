use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chain::Chain;
use crate::serde_util::checksummed;

/// A contract whose creation block we want to know.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractWatch {
    pub chain: Chain,
    pub contract_address: Address,
}

/// Creation block of a contract. Keyed by `(chain, contract_address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCreationInfo {
    pub chain: Chain,
    #[serde(serialize_with = "checksummed")]
    pub contract_address: Address,
    pub block_number: u64,
    pub block_datetime: DateTime<Utc>,
}

impl ContractCreationInfo {
    pub const STREAM: &'static str = "contract_creation_date";
    pub const KEY_PROPERTIES: &'static [&'static str] = &["chain", "contract_address"];

    pub fn new(contract: &ContractWatch, block_number: u64, block_datetime: DateTime<Utc>) -> Self {
        Self {
            chain: contract.chain,
            contract_address: contract.contract_address,
            block_number,
            block_datetime,
        }
    }

    /// JSON schema of the emitted record.
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "chain": { "type": "string" },
                "contract_address": { "type": "string" },
                "block_number": { "type": "integer" },
                "block_datetime": { "type": "string", "format": "date-time" }
            },
            "required": ["chain", "contract_address", "block_number", "block_datetime"]
        })
    }
}
