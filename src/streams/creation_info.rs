use futures::stream::{self, Stream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chain::Chain;
use crate::config::Config;
use crate::explorer::{self, ContractCreationInfo, ContractWatch, ExplorerClient};
use crate::fanout::{fan_out, FanOutSummary, WorkerFailurePolicy};
use crate::sink::RecordSink;

/// One explorer client per chain, each with its own HTTP client and rate
/// limiter. Chains without a usable explorer are left out with a warning.
pub fn resolve_explorers(
    chains: impl IntoIterator<Item = Chain>,
    config: &Config,
) -> HashMap<Chain, Arc<dyn ExplorerClient>> {
    let base = config.http_client_config();
    let mut explorers: HashMap<Chain, Arc<dyn ExplorerClient>> = HashMap::new();

    for chain in chains {
        let explorer_config = config.explorer_config(chain);
        match explorer::resolve(&explorer_config, &base) {
            Ok(client) => {
                explorers.insert(chain, Arc::from(client));
            }
            Err(e) => tracing::warn!(
                chain = %chain,
                explorer = %explorer_config.explorer_type,
                error = %e,
                "No explorer client, skipping chain"
            ),
        }
    }
    explorers
}

/// Looks up every contract of one chain, one request burst at a time.
/// Failed lookups are logged and skipped.
fn creation_worker(
    client: Arc<dyn ExplorerClient>,
    contracts: Vec<ContractWatch>,
) -> impl Stream<Item = eyre::Result<ContractCreationInfo>> + Send + 'static {
    stream::iter(contracts)
        .then(move |contract| {
            let client = client.clone();
            async move {
                match client.get_contract_creation_info(&contract).await {
                    Ok(info) => Some(info),
                    Err(e) => {
                        tracing::warn!(
                            chain = %contract.chain,
                            contract = %contract.contract_address,
                            explorer = %client.explorer_type(),
                            error = %e,
                            "Failed to fetch contract creation info"
                        );
                        None
                    }
                }
            }
        })
        .filter_map(|info| futures::future::ready(info.map(Ok)))
}

/// Emits one `contract_creation_date` record per resolvable contract.
pub async fn sync_creation_info(
    watches: Vec<ContractWatch>,
    explorers: &HashMap<Chain, Arc<dyn ExplorerClient>>,
    policy: WorkerFailurePolicy,
    sink: &mut dyn RecordSink,
    cancel: &CancellationToken,
) -> eyre::Result<FanOutSummary> {
    let mut by_chain: BTreeMap<Chain, Vec<ContractWatch>> = BTreeMap::new();
    for watch in watches {
        by_chain.entry(watch.chain).or_default().push(watch);
    }

    let mut groups = Vec::new();
    for (chain, contracts) in by_chain {
        match explorers.get(&chain) {
            Some(client) => groups.push((chain.to_string(), (client.clone(), contracts))),
            None => tracing::warn!(
                chain = %chain,
                contracts = contracts.len(),
                "No explorer for chain, skipping its contracts"
            ),
        }
    }

    sink.write_schema(
        ContractCreationInfo::STREAM,
        &ContractCreationInfo::schema(),
        ContractCreationInfo::KEY_PROPERTIES,
        &[],
    )?;

    tracing::info!(chains = groups.len(), "Fetching contract creation infos");
    let mut fan = fan_out(groups, policy, cancel, |(client, contracts)| {
        creation_worker(client, contracts)
    });

    let mut records = 0usize;
    while let Some(item) = fan.next().await {
        let info = match item {
            Ok(info) => info,
            Err(e) => {
                fan.finish().await;
                return Err(e);
            }
        };
        sink.write_record(ContractCreationInfo::STREAM, &serde_json::to_value(&info)?)?;
        records += 1;
    }
    sink.flush()?;

    let summary = fan.finish().await;
    tracing::info!(
        records,
        chains = summary.workers,
        failed = summary.failed.len(),
        "Contract creation infos done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{ExplorerError, ExplorerType};
    use crate::sink::testing::MemorySink;
    use alloy::primitives::Address;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    /// Answers from a fixed table; unknown contracts are payload errors.
    struct TableExplorer {
        blocks: HashMap<Address, u64>,
    }

    #[async_trait]
    impl ExplorerClient for TableExplorer {
        fn explorer_type(&self) -> ExplorerType {
            ExplorerType::Etherscan
        }

        async fn get_contract_creation_info(
            &self,
            contract: &ContractWatch,
        ) -> Result<ContractCreationInfo, ExplorerError> {
            let block = self
                .blocks
                .get(&contract.contract_address)
                .ok_or_else(|| ExplorerError::payload(ExplorerType::Etherscan, "no transactions"))?;
            Ok(ContractCreationInfo::new(
                contract,
                *block,
                Utc.timestamp_opt(1632224639, 0).unwrap(),
            ))
        }
    }

    fn watch(chain: Chain, byte: u8) -> ContractWatch {
        ContractWatch {
            chain,
            contract_address: Address::repeat_byte(byte),
        }
    }

    #[tokio::test]
    async fn test_failed_lookups_are_skipped() {
        let mut explorers: HashMap<Chain, Arc<dyn ExplorerClient>> = HashMap::new();
        explorers.insert(
            Chain::Bsc,
            Arc::new(TableExplorer {
                blocks: HashMap::from([(Address::repeat_byte(1), 100), (Address::repeat_byte(2), 200)]),
            }),
        );
        explorers.insert(
            Chain::Base,
            Arc::new(TableExplorer {
                blocks: HashMap::from([(Address::repeat_byte(4), 400)]),
            }),
        );

        let watches = vec![
            watch(Chain::Bsc, 1),
            watch(Chain::Bsc, 2),
            watch(Chain::Bsc, 3),
            watch(Chain::Base, 4),
            watch(Chain::One, 5),
        ];
        let mut sink = MemorySink::default();
        let summary = sync_creation_info(
            watches,
            &explorers,
            WorkerFailurePolicy::Isolate,
            &mut sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.workers, 2);
        assert!(summary.is_clean());
        assert_eq!(sink.messages[0]["type"], "SCHEMA");
        assert_eq!(sink.messages[0]["stream"], "contract_creation_date");

        let mut blocks: Vec<u64> = sink
            .records("contract_creation_date")
            .iter()
            .map(|r| r["block_number"].as_u64().unwrap())
            .collect();
        blocks.sort();
        assert_eq!(blocks, vec![100, 200, 400]);
    }

    #[tokio::test]
    async fn test_record_shape() {
        let mut explorers: HashMap<Chain, Arc<dyn ExplorerClient>> = HashMap::new();
        let address: Address = "0x5B19bd330A84c049b62D5B0FC2bA120217a18C1C".parse().unwrap();
        explorers.insert(
            Chain::Canto,
            Arc::new(TableExplorer {
                blocks: HashMap::from([(address, 3021339)]),
            }),
        );
        let mut sink = MemorySink::default();
        sync_creation_info(
            vec![ContractWatch {
                chain: Chain::Canto,
                contract_address: address,
            }],
            &explorers,
            WorkerFailurePolicy::Propagate,
            &mut sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let records = sink.records("contract_creation_date");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["chain"], "canto");
        assert_eq!(records[0]["contract_address"], "0x5B19bd330A84c049b62D5B0FC2bA120217a18C1C");
        assert_eq!(records[0]["block_datetime"], "2021-09-21T11:43:59Z");
    }

    #[test]
    fn test_harmony_has_no_explorer() {
        let explorers = resolve_explorers([Chain::One], &Config::default());
        assert!(explorers.is_empty());
    }
}
