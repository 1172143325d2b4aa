use alloy::primitives::{Address, B256};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::chain::Chain;
use crate::serde_util::checksummed;

/// Events the crawler knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "IERC20_Transfer")]
    Ierc20Transfer,
    #[serde(rename = "BeefyZapRouter_FulfilledOrder")]
    BeefyZapRouterFulfilledOrder,
    #[serde(rename = "BeefyVault_UpgradeStrat")]
    BeefyVaultUpgradeStrat,
}

impl EventType {
    pub const ALL: [EventType; 3] = [
        EventType::Ierc20Transfer,
        EventType::BeefyZapRouterFulfilledOrder,
        EventType::BeefyVaultUpgradeStrat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Ierc20Transfer => "IERC20_Transfer",
            EventType::BeefyZapRouterFulfilledOrder => "BeefyZapRouter_FulfilledOrder",
            EventType::BeefyVaultUpgradeStrat => "BeefyVault_UpgradeStrat",
        }
    }

    /// Event name inside its ABI.
    pub fn event_name(&self) -> &'static str {
        match self {
            EventType::Ierc20Transfer => "Transfer",
            EventType::BeefyZapRouterFulfilledOrder => "FulfilledOrder",
            EventType::BeefyVaultUpgradeStrat => "UpgradeStrat",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    /// Accepts both `IERC20_Transfer` and the watch-list spelling `IERC20:Transfer`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(':', "_");
        EventType::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == normalized)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Variant payload of a decoded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type")]
pub enum EventData {
    #[serde(rename = "IERC20_Transfer")]
    Ierc20Transfer {
        #[serde(serialize_with = "checksummed")]
        from_address: Address,
        #[serde(serialize_with = "checksummed")]
        to_address: Address,
        value: BigDecimal,
    },
    #[serde(rename = "BeefyZapRouter_FulfilledOrder")]
    BeefyZapRouterFulfilledOrder {
        #[serde(serialize_with = "checksummed")]
        caller_address: Address,
        #[serde(serialize_with = "checksummed")]
        recipient_address: Address,
    },
    #[serde(rename = "BeefyVault_UpgradeStrat")]
    BeefyVaultUpgradeStrat {
        #[serde(serialize_with = "checksummed")]
        implementation: Address,
    },
}

impl EventData {
    pub fn event_type(&self) -> EventType {
        match self {
            EventData::Ierc20Transfer { .. } => EventType::Ierc20Transfer,
            EventData::BeefyZapRouterFulfilledOrder { .. } => EventType::BeefyZapRouterFulfilledOrder,
            EventData::BeefyVaultUpgradeStrat { .. } => EventType::BeefyVaultUpgradeStrat,
        }
    }
}

/// A decoded on-chain event with its position in the chain.
/// Natural key: `(chain, contract_address, block_number, log_index)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnyEvent {
    pub chain: Chain,
    #[serde(serialize_with = "checksummed")]
    pub contract_address: Address,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub block_datetime: DateTime<Utc>,
    pub log_index: u64,
    pub data: EventData,
}

impl AnyEvent {
    pub fn unique_key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.chain,
            self.contract_address.to_checksum(None),
            self.block_number,
            self.log_index
        )
    }
}

/// A contract and the events to collect from it, starting at its creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEventWatch {
    pub chain: Chain,
    pub contract_address: Address,
    pub events: BTreeSet<EventType>,
    pub creation_block_number: u64,
    pub creation_block_datetime: DateTime<Utc>,
}

/// Everything the crawler needs for one chain in one run.
/// Only `last_seen_height` outlives the run.
#[derive(Debug, Clone)]
pub struct SquidImportState {
    pub chain: Chain,
    pub last_seen_height: u64,
    pub watched_contracts: Vec<ContractEventWatch>,
}

impl SquidImportState {
    /// First block to scan: the earliest creation block, or the checkpoint
    /// when it is further along.
    pub fn start_block(&self) -> u64 {
        let earliest_creation = self
            .watched_contracts
            .iter()
            .map(|c| c.creation_block_number)
            .min()
            .unwrap_or(0);
        earliest_creation.max(self.last_seen_height)
    }
}

/// One record of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStreamRecord {
    pub unique_key: String,
    pub chain: Chain,
    pub last_seen_height: u64,
    pub event: AnyEvent,
}

impl EventStreamRecord {
    pub const STREAM: &'static str = "squid_event_stream";
    pub const KEY_PROPERTIES: &'static [&'static str] = &["unique_key"];
    pub const REPLICATION_KEY: &'static str = "last_seen_height";

    pub fn new(event: AnyEvent) -> Self {
        Self {
            unique_key: event.unique_key(),
            chain: event.chain,
            last_seen_height: event.block_number,
            event,
        }
    }

    pub fn schema() -> serde_json::Value {
        let address = serde_json::json!({ "type": "string" });
        serde_json::json!({
            "type": "object",
            "properties": {
                "unique_key": { "type": "string" },
                "chain": { "type": "string" },
                "last_seen_height": { "type": "integer" },
                "event": {
                    "type": "object",
                    "properties": {
                        "chain": { "type": "string" },
                        "contract_address": address,
                        "transaction_hash": { "type": "string" },
                        "block_number": { "type": "integer" },
                        "block_datetime": { "type": "string", "format": "date-time" },
                        "log_index": { "type": "integer" },
                        "data": {
                            "type": "object",
                            "properties": {
                                "event_type": {
                                    "type": "string",
                                    "enum": EventType::ALL.iter().map(|e| e.as_str()).collect::<Vec<_>>()
                                },
                                "from_address": address,
                                "to_address": address,
                                "value": { "type": "string" },
                                "caller_address": address,
                                "recipient_address": address,
                                "implementation": address
                            },
                            "required": ["event_type"]
                        }
                    }
                }
            },
            "required": ["unique_key", "chain", "last_seen_height", "event"]
        })
    }
}
