use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chain::Chain;
use crate::config::Config;
use crate::fanout::{fan_out, FanOutSummary, WorkerFailurePolicy};
use crate::http::HttpClient;
use crate::indexer::{ArchiveClient, ContractEventWatch, CrawlItem, Crawler, EventDecoder, EventStreamRecord, SquidImportState};
use crate::sink::RecordSink;
use crate::state::CheckpointState;

/// Groups the watch list per chain and attaches each chain's checkpoint.
pub fn build_import_states(watches: Vec<ContractEventWatch>, state: &CheckpointState) -> Vec<SquidImportState> {
    let mut by_chain: BTreeMap<Chain, Vec<ContractEventWatch>> = BTreeMap::new();
    for watch in watches {
        by_chain.entry(watch.chain).or_default().push(watch);
    }

    by_chain
        .into_iter()
        .map(|(chain, watched_contracts)| SquidImportState {
            chain,
            last_seen_height: state.last_seen_height(EventStreamRecord::STREAM, chain),
            watched_contracts,
        })
        .collect()
}

/// One archive client per chain that has an archive URL.
pub fn archive_clients(
    chains: impl IntoIterator<Item = Chain>,
    config: &Config,
) -> eyre::Result<HashMap<Chain, ArchiveClient>> {
    let mut clients = HashMap::new();
    for chain in chains {
        if let Some(url) = config.archive_url(chain) {
            let http = HttpClient::new(config.http_client_config())?;
            clients.insert(chain, ArchiveClient::new(url, http));
        }
    }
    Ok(clients)
}

/// Crawls every chain in parallel. Records of a page are written before the
/// page's checkpoint, and the checkpoint only ever moves forward.
pub async fn sync_contract_events(
    imports: Vec<SquidImportState>,
    archives: &HashMap<Chain, ArchiveClient>,
    decoder: Arc<EventDecoder>,
    policy: WorkerFailurePolicy,
    sink: &mut dyn RecordSink,
    state: &mut CheckpointState,
    cancel: &CancellationToken,
) -> eyre::Result<FanOutSummary> {
    sink.write_schema(
        EventStreamRecord::STREAM,
        &EventStreamRecord::schema(),
        EventStreamRecord::KEY_PROPERTIES,
        &[EventStreamRecord::REPLICATION_KEY],
    )?;

    let groups: Vec<(String, Crawler)> = imports
        .into_iter()
        .map(|import| {
            let archive = archives.get(&import.chain).cloned();
            let crawler = Crawler::new(import, archive, decoder.clone());
            tracing::info!(
                chain = %crawler.chain(),
                start_block = crawler.start_block(),
                "Crawler ready"
            );
            (crawler.chain().to_string(), crawler)
        })
        .collect();

    let mut fan = fan_out(groups, policy, cancel, |crawler| {
        crawler.into_stream().map(|item| item.map_err(eyre::Report::from))
    });

    let mut records = 0usize;
    while let Some(item) = fan.next().await {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                fan.finish().await;
                return Err(e);
            }
        };
        match item {
            CrawlItem::Event(record) => {
                sink.write_record(EventStreamRecord::STREAM, &serde_json::to_value(&record)?)?;
                records += 1;
            }
            CrawlItem::Checkpoint { chain, height } => {
                if state.advance(EventStreamRecord::STREAM, chain, height) {
                    tracing::debug!(chain = %chain, height, "Checkpoint");
                    sink.write_checkpoint(&state.to_value())?;
                }
            }
        }
    }
    sink.write_checkpoint(&state.to_value())?;

    let summary = fan.finish().await;
    tracing::info!(
        records,
        chains = summary.workers,
        failed = summary.failed.len(),
        "Contract events done"
    );
    Ok(summary)
}
