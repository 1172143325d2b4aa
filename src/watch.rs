//! Loads the watch lists: which contracts to date, and which contracts and
//! events to crawl. Rows that do not parse are skipped with a warning.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::chain::{Chain, UnknownChain};
use crate::config::{Config, WatchListKind};
use crate::db::repository;
use crate::explorer::datetime::parse_utc;
use crate::explorer::ContractWatch;
use crate::indexer::types::{ContractEventWatch, EventType, UnknownEventType};

/// Separator of the `events` column in CSV watch lists.
pub const CSV_EVENT_SEPARATOR: char = '|';

#[derive(Debug, Error)]
pub enum WatchRowError {
    #[error(transparent)]
    Chain(#[from] UnknownChain),

    #[error("invalid contract address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error(transparent)]
    Event(#[from] UnknownEventType),

    #[error("no events listed")]
    NoEvents,

    #[error("invalid creation block number {0}")]
    BlockNumber(i64),

    #[error("invalid creation block datetime '{0}'")]
    Datetime(String),
}

fn parse_address(address: &str) -> Result<Address, WatchRowError> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| WatchRowError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

pub fn parse_contract_watch(chain: &str, address: &str) -> Result<ContractWatch, WatchRowError> {
    Ok(ContractWatch {
        chain: chain.parse()?,
        contract_address: parse_address(address)?,
    })
}

pub fn parse_event_watch<S: AsRef<str>>(
    chain: &str,
    address: &str,
    events: impl IntoIterator<Item = S>,
    creation_block_number: i64,
    creation_block_datetime: DateTime<Utc>,
) -> Result<ContractEventWatch, WatchRowError> {
    let chain: Chain = chain.parse()?;
    let contract_address = parse_address(address)?;
    let events = events
        .into_iter()
        .filter(|e| !e.as_ref().trim().is_empty())
        .map(|e| e.as_ref().parse::<EventType>())
        .collect::<Result<BTreeSet<_>, _>>()?;
    if events.is_empty() {
        return Err(WatchRowError::NoEvents);
    }
    let creation_block_number =
        u64::try_from(creation_block_number).map_err(|_| WatchRowError::BlockNumber(creation_block_number))?;

    Ok(ContractEventWatch {
        chain,
        contract_address,
        events,
        creation_block_number,
        creation_block_datetime,
    })
}

fn keep<T>(row: usize, parsed: Result<T, WatchRowError>, out: &mut Vec<T>) {
    match parsed {
        Ok(watch) => out.push(watch),
        Err(e) => tracing::warn!(row, error = %e, "Skipping watch list row"),
    }
}

// ============================================================
// CSV
// ============================================================

#[derive(Debug, Deserialize)]
struct ContractCsvRow {
    chain: String,
    contract_address: String,
}

#[derive(Debug, Deserialize)]
struct EventCsvRow {
    chain: String,
    contract_address: String,
    events: String,
    creation_block_number: i64,
    creation_block_datetime: String,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

pub fn read_contracts_csv<R: Read>(reader: R) -> Vec<ContractWatch> {
    let mut out = Vec::new();
    for (row, result) in csv_reader(reader).deserialize::<ContractCsvRow>().enumerate() {
        let parsed = match result {
            Ok(r) => parse_contract_watch(&r.chain, &r.contract_address),
            Err(e) => {
                tracing::warn!(row, error = %e, "Skipping unreadable watch list row");
                continue;
            }
        };
        keep(row, parsed, &mut out);
    }
    out
}

pub fn read_events_csv<R: Read>(reader: R) -> Vec<ContractEventWatch> {
    let mut out = Vec::new();
    for (row, result) in csv_reader(reader).deserialize::<EventCsvRow>().enumerate() {
        let r = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(row, error = %e, "Skipping unreadable watch list row");
                continue;
            }
        };
        let parsed = parse_utc(&r.creation_block_datetime)
            .ok_or_else(|| WatchRowError::Datetime(r.creation_block_datetime.clone()))
            .and_then(|dt| {
                let events = r.events.split(CSV_EVENT_SEPARATOR);
                parse_event_watch(&r.chain, &r.contract_address, events, r.creation_block_number, dt)
            });
        keep(row, parsed, &mut out);
    }
    out
}

fn open(path: &Path) -> eyre::Result<std::fs::File> {
    std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("Failed to open watch list '{}': {}", path.display(), e))
}

// ============================================================
// Source
// ============================================================

pub enum WatchListSource {
    Postgres(PgPool),
    Csv { contracts: PathBuf, events: PathBuf },
}

impl WatchListSource {
    /// Connects to the database only when the watch list lives there.
    pub async fn from_config(config: &Config) -> eyre::Result<Self> {
        match config.watch_list.source {
            WatchListKind::Postgres => {
                let pool = repository::connect(&config.database()?).await?;
                Ok(WatchListSource::Postgres(pool))
            }
            WatchListKind::Csv => {
                let (Some(contracts), Some(events)) =
                    (&config.watch_list.contracts_csv, &config.watch_list.events_csv)
                else {
                    return Err(eyre::eyre!("CSV watch list needs contracts_csv and events_csv"));
                };
                Ok(WatchListSource::Csv {
                    contracts: contracts.clone(),
                    events: events.clone(),
                })
            }
        }
    }

    pub async fn contracts(&self) -> eyre::Result<Vec<ContractWatch>> {
        let watches = match self {
            WatchListSource::Postgres(pool) => {
                let mut out = Vec::new();
                for (row, (chain, address)) in repository::fetch_contract_watchlist(pool).await?.iter().enumerate() {
                    keep(row, parse_contract_watch(chain, address), &mut out);
                }
                out
            }
            WatchListSource::Csv { contracts, .. } => read_contracts_csv(open(contracts)?),
        };
        tracing::info!(contracts = watches.len(), "Contract watch list loaded");
        Ok(watches)
    }

    pub async fn event_watches(&self) -> eyre::Result<Vec<ContractEventWatch>> {
        let watches = match self {
            WatchListSource::Postgres(pool) => {
                let mut out = Vec::new();
                for (row, (chain, address, events, block, datetime)) in
                    repository::fetch_event_watchlist(pool).await?.into_iter().enumerate()
                {
                    keep(row, parse_event_watch(&chain, &address, events, block, datetime), &mut out);
                }
                out
            }
            WatchListSource::Csv { events, .. } => read_events_csv(open(events)?),
        };
        tracing::info!(contracts = watches.len(), "Event watch list loaded");
        Ok(watches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_contracts_csv_skips_bad_rows() {
        let csv = "\
chain,contract_address
bsc,0xec7c0205a6f426c2cb1667d783b5b4fd2f875434
solana,0xec7c0205a6f426c2cb1667d783b5b4fd2f875434
ethereum,not-an-address
 Linea , 0x01A3c8E513B758EBB011F7AFaf6C37616c9C24d9
";
        let watches = read_contracts_csv(csv.as_bytes());
        assert_eq!(watches.len(), 2);
        assert_eq!(watches[0].chain, Chain::Bsc);
        assert_eq!(watches[1].chain, Chain::Linea);
        assert_eq!(
            watches[1].contract_address.to_checksum(None),
            "0x01A3c8E513B758EBB011F7AFaf6C37616c9C24d9"
        );
    }

    #[test]
    fn test_events_csv() {
        let csv = "\
chain,contract_address,events,creation_block_number,creation_block_datetime
bsc,0xec7c0205a6f426c2cb1667d783b5b4fd2f875434,IERC20:Transfer|BeefyVault:UpgradeStrat,1403882,2021-09-21T11:43:59Z
bsc,0x13761d473ff1478957adb80cb4e58e0af76d2c51,BeefyZapRouter:Approval,100,2021-09-21T11:43:59Z
bsc,0x13761d473ff1478957adb80cb4e58e0af76d2c51,,100,2021-09-21T11:43:59Z
bsc,0x13761d473ff1478957adb80cb4e58e0af76d2c51,IERC20:Transfer,-1,2021-09-21T11:43:59Z
bsc,0x13761d473ff1478957adb80cb4e58e0af76d2c51,IERC20:Transfer,100,yesterday
";
        let watches = read_events_csv(csv.as_bytes());
        assert_eq!(watches.len(), 1);
        let w = &watches[0];
        assert_eq!(w.creation_block_number, 1403882);
        assert_eq!(
            w.events,
            BTreeSet::from([EventType::Ierc20Transfer, EventType::BeefyVaultUpgradeStrat])
        );
        assert_eq!(w.creation_block_datetime, Utc.timestamp_opt(1632224639, 0).unwrap());
    }

    #[test]
    fn test_parse_event_watch_errors() {
        let dt = Utc.timestamp_opt(0, 0).unwrap();
        let addr = "0xec7c0205a6f426c2cb1667d783b5b4fd2f875434";
        assert!(matches!(
            parse_event_watch("bsc", addr, ["IERC20_Transfer"], -5, dt),
            Err(WatchRowError::BlockNumber(-5))
        ));
        assert!(matches!(
            parse_event_watch("bsc", addr, Vec::<&str>::new(), 5, dt),
            Err(WatchRowError::NoEvents)
        ));
        assert!(matches!(
            parse_event_watch("tron", addr, ["IERC20_Transfer"], 5, dt),
            Err(WatchRowError::Chain(_))
        ));
    }
}
