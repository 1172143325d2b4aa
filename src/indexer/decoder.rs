use alloy::primitives::{Address, Log as PrimitiveLog, LogData, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use super::abi::{AbiError, AbiSet};
use super::archive::ArchiveLog;
use super::types::{AnyEvent, EventData, EventType};
use crate::chain::Chain;

// FulfilledOrder indexes a struct, which is hashed into topics[1]; only its
// signature is used here and the addresses are read from topics[2..4].
sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
    event UpgradeStrat(address implementation);

    struct Input { address token; uint256 amount; }
    struct Output { address token; uint256 minOutputAmount; }
    struct Relay { address target; uint256 value; bytes data; }
    struct Order { Input[] inputs; Output[] outputs; Relay relay; address user; address recipient; }
    event FulfilledOrder(Order indexed order, address indexed caller, address indexed recipient);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    EmptyTopics,

    #[error("unknown topic0 {0}")]
    UnknownTopic0(B256),

    #[error("{event_type} expects {expected} topics, got {got}")]
    TopicCount {
        event_type: EventType,
        expected: usize,
        got: usize,
    },

    #[error("failed to decode {event_type}: {reason}")]
    Abi {
        event_type: EventType,
        reason: String,
    },
}

type DecodeFn = fn(&LogData) -> Result<EventData, DecodeError>;

/// Block-level fields every decoded event carries.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    pub chain: Chain,
    pub block_number: u64,
    pub block_datetime: DateTime<Utc>,
}

/// Immutable `topic0 -> (event type, decoder)` dispatch table.
pub struct EventDecoder {
    by_topic0: HashMap<B256, (EventType, DecodeFn)>,
}

fn u256_to_bd(value: U256) -> Result<BigDecimal, DecodeError> {
    BigDecimal::from_str(&value.to_string()).map_err(|e| DecodeError::Abi {
        event_type: EventType::Ierc20Transfer,
        reason: e.to_string(),
    })
}

fn expect_topics(data: &LogData, event_type: EventType, expected: usize) -> Result<(), DecodeError> {
    let got = data.topics().len();
    if got != expected {
        return Err(DecodeError::TopicCount {
            event_type,
            expected,
            got,
        });
    }
    Ok(())
}

fn decode_transfer(data: &LogData) -> Result<EventData, DecodeError> {
    let event_type = EventType::Ierc20Transfer;
    expect_topics(data, event_type, 3)?;
    let log = PrimitiveLog {
        address: Address::ZERO,
        data: data.clone(),
    };
    let decoded = Transfer::decode_log(&log).map_err(|e| DecodeError::Abi {
        event_type,
        reason: e.to_string(),
    })?;
    Ok(EventData::Ierc20Transfer {
        from_address: decoded.from,
        to_address: decoded.to,
        value: u256_to_bd(decoded.value)?,
    })
}

fn decode_fulfilled_order(data: &LogData) -> Result<EventData, DecodeError> {
    expect_topics(data, EventType::BeefyZapRouterFulfilledOrder, 4)?;
    let topics = data.topics();
    Ok(EventData::BeefyZapRouterFulfilledOrder {
        caller_address: Address::from_word(topics[2]),
        recipient_address: Address::from_word(topics[3]),
    })
}

fn decode_upgrade_strat(data: &LogData) -> Result<EventData, DecodeError> {
    let event_type = EventType::BeefyVaultUpgradeStrat;
    expect_topics(data, event_type, 1)?;
    let log = PrimitiveLog {
        address: Address::ZERO,
        data: data.clone(),
    };
    let decoded = UpgradeStrat::decode_log(&log).map_err(|e| DecodeError::Abi {
        event_type,
        reason: e.to_string(),
    })?;
    Ok(EventData::BeefyVaultUpgradeStrat {
        implementation: decoded.implementation,
    })
}

impl EventDecoder {
    /// Builds the dispatch table from the ABI files. Fails when an ABI does
    /// not declare an event or declares it with a different signature than
    /// the decoder handles.
    pub fn from_abis(abis: &AbiSet) -> Result<Self, AbiError> {
        let entries: [(EventType, B256, DecodeFn); 3] = [
            (EventType::Ierc20Transfer, Transfer::SIGNATURE_HASH, decode_transfer),
            (
                EventType::BeefyZapRouterFulfilledOrder,
                FulfilledOrder::SIGNATURE_HASH,
                decode_fulfilled_order,
            ),
            (EventType::BeefyVaultUpgradeStrat, UpgradeStrat::SIGNATURE_HASH, decode_upgrade_strat),
        ];

        let mut by_topic0 = HashMap::new();
        for (event_type, expected, decode) in entries {
            let from_abi = abis.topic0(event_type)?;
            if from_abi != expected {
                return Err(AbiError::SelectorMismatch {
                    event_type,
                    from_abi,
                    expected,
                });
            }
            by_topic0.insert(from_abi, (event_type, decode));
        }

        Ok(Self { by_topic0 })
    }

    pub fn topic0(&self, event_type: EventType) -> Option<B256> {
        self.by_topic0
            .iter()
            .find(|(_, (t, _))| *t == event_type)
            .map(|(topic, _)| *topic)
    }

    /// Decodes one archive log into an `AnyEvent`.
    pub fn decode(&self, log: &ArchiveLog, ctx: &BlockContext) -> Result<AnyEvent, DecodeError> {
        let topic0 = *log.topics.first().ok_or(DecodeError::EmptyTopics)?;
        let (_, decode) = self
            .by_topic0
            .get(&topic0)
            .ok_or(DecodeError::UnknownTopic0(topic0))?;

        let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
        Ok(AnyEvent {
            chain: ctx.chain,
            contract_address: log.address,
            transaction_hash: log.transaction_hash,
            block_number: ctx.block_number,
            block_datetime: ctx.block_datetime,
            log_index: log.log_index,
            data: decode(&data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, bytes, Bytes};
    use chrono::TimeZone;

    fn decoder() -> EventDecoder {
        EventDecoder::from_abis(&AbiSet::bundled().unwrap()).unwrap()
    }

    fn ctx() -> BlockContext {
        BlockContext {
            chain: Chain::Bsc,
            block_number: 1403882,
            block_datetime: Utc.timestamp_opt(1632224639, 0).unwrap(),
        }
    }

    fn log(address: Address, topics: Vec<B256>, data: Bytes) -> ArchiveLog {
        ArchiveLog {
            log_index: 5,
            transaction_index: 0,
            address,
            data,
            topics,
            transaction_hash: b256!("88d81b4c2fa56919d0e0f45b088f2dc31dbc0b756646692cf83024c3c109bf63"),
        }
    }

    #[test]
    fn test_decode_transfer() {
        let raw = log(
            address!("ec7c0205a6f426c2cb1667d783b5b4fd2f875434"),
            vec![
                b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"),
                B256::ZERO,
                b256!("000000000000000000000000982f264ce97365864181df65df4931c593a515ad"),
            ],
            bytes!("000000000000000000000000000000000000000000000000454c584c3725bc4d"),
        );

        let event = decoder().decode(&raw, &ctx()).unwrap();
        assert_eq!(event.log_index, 5);
        assert_eq!(event.block_number, 1403882);
        match &event.data {
            EventData::Ierc20Transfer {
                from_address,
                to_address,
                value,
            } => {
                assert_eq!(*from_address, Address::ZERO);
                assert_eq!(
                    to_address.to_checksum(None),
                    "0x982F264ce97365864181df65dF4931C593A515ad"
                );
                assert_eq!(value.to_string(), "4993463171213016141");
            }
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_fulfilled_order() {
        let raw = log(
            address!("13761d473ff1478957adb80cb4e58e0af76d2c51"),
            vec![
                b256!("1ba5b6ed656994657175705961138c96bd8ec133c35817fa85903f450129e0b1"),
                b256!("12c747f67190f4b64fff477c0e1997b021e55e2fd489e79ee3095af0054b47cf"),
                b256!("0000000000000000000000003edb7d5b494ccb9bb84d11ca25f320af2bb15f40"),
                b256!("0000000000000000000000003edb7d5b494ccb9bb84d11ca25f320af2bb15f40"),
            ],
            Bytes::new(),
        );

        let event = decoder().decode(&raw, &ctx()).unwrap();
        let expected = "0x3EDB7d5b494cCB9bb84D11CA25F320Af2bb15f40";
        match &event.data {
            EventData::BeefyZapRouterFulfilledOrder {
                caller_address,
                recipient_address,
            } => {
                assert_eq!(caller_address.to_checksum(None), expected);
                assert_eq!(recipient_address.to_checksum(None), expected);
            }
            other => panic!("expected fulfilled order, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_upgrade_strat() {
        let raw = log(
            address!("0383E88A19E5c387FeBafbF51E5bA642d2ad8bE0"),
            vec![b256!("7f37d440e85aba7fbf641c4bda5ca4ef669a80bffaacde2aa8d9feb1b048c82c")],
            bytes!("000000000000000000000000a8bf778716e0630f56a4bdca9ae9a3e0b2bd29f5"),
        );

        let event = decoder().decode(&raw, &ctx()).unwrap();
        assert_eq!(
            event.data,
            EventData::BeefyVaultUpgradeStrat {
                implementation: address!("A8bf778716e0630F56A4bDCa9AE9A3e0B2BD29f5"),
            }
        );
    }

    #[test]
    fn test_decode_errors() {
        let d = decoder();
        let empty = log(Address::ZERO, vec![], Bytes::new());
        assert_eq!(d.decode(&empty, &ctx()).unwrap_err(), DecodeError::EmptyTopics);

        let unknown = log(Address::ZERO, vec![B256::repeat_byte(0xab)], Bytes::new());
        assert!(matches!(
            d.decode(&unknown, &ctx()).unwrap_err(),
            DecodeError::UnknownTopic0(_)
        ));

        let short_order = log(
            Address::ZERO,
            vec![
                b256!("1ba5b6ed656994657175705961138c96bd8ec133c35817fa85903f450129e0b1"),
                B256::ZERO,
            ],
            Bytes::new(),
        );
        assert_eq!(
            d.decode(&short_order, &ctx()).unwrap_err(),
            DecodeError::TopicCount {
                event_type: EventType::BeefyZapRouterFulfilledOrder,
                expected: 4,
                got: 2,
            }
        );

        let truncated_transfer = log(
            Address::ZERO,
            vec![
                b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"),
                B256::ZERO,
                B256::ZERO,
            ],
            bytes!("0102"),
        );
        assert!(matches!(
            d.decode(&truncated_transfer, &ctx()).unwrap_err(),
            DecodeError::Abi { .. }
        ));
    }

    #[test]
    fn test_topic0_lookup() {
        let d = decoder();
        assert_eq!(d.topic0(EventType::Ierc20Transfer), Some(Transfer::SIGNATURE_HASH));
        assert_eq!(
            d.topic0(EventType::BeefyZapRouterFulfilledOrder),
            Some(b256!("1ba5b6ed656994657175705961138c96bd8ec133c35817fa85903f450129e0b1"))
        );
    }
}
