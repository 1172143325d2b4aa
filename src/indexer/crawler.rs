//! Incremental, checkpointed crawl of one chain's log archive.
//!
//! The crawler is a small state machine driven by `next_item`:
//! `Init -> FetchHeight -> FetchWorkerShard -> DecodeAndEmit -> (FetchWorkerShard | Done)`.
//! Every page yields its events in block order followed by one checkpoint,
//! so a consumer that persists the checkpoint only after the page's records
//! replays at most one page after a crash.

use alloy::primitives::{Address, B256};
use futures::stream::{self, Stream};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

use super::archive::{ArchiveBlock, ArchiveClient, ArchiveError, ArchiveQuery};
use super::decoder::{BlockContext, EventDecoder};
use super::types::{EventStreamRecord, EventType, SquidImportState};
use crate::chain::Chain;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("archive request for {chain} failed: {source}")]
    Archive {
        chain: Chain,
        #[source]
        source: ArchiveError,
    },

    #[error("block {block} on {chain} has an invalid timestamp")]
    BadBlockTimestamp { chain: Chain, block: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlItem {
    Event(EventStreamRecord),
    /// Every event up to and including `height` has been yielded.
    Checkpoint { chain: Chain, height: u64 },
}

enum CrawlState {
    Init,
    FetchHeight {
        next_block: u64,
    },
    FetchWorkerShard {
        next_block: u64,
        last_block: u64,
    },
    DecodeAndEmit {
        blocks: Vec<ArchiveBlock>,
        next_block: u64,
        last_block: u64,
    },
    Done,
}

pub struct Crawler {
    chain: Chain,
    archive: Option<ArchiveClient>,
    decoder: Arc<EventDecoder>,
    start_block: u64,
    watched: HashMap<Address, BTreeSet<EventType>>,
    state: CrawlState,
    pending: VecDeque<CrawlItem>,
}

impl Crawler {
    /// `archive` is `None` for chains without a log archive; such a crawl
    /// ends immediately.
    pub fn new(import: SquidImportState, archive: Option<ArchiveClient>, decoder: Arc<EventDecoder>) -> Self {
        let start_block = import.start_block();
        let mut watched: HashMap<Address, BTreeSet<EventType>> = HashMap::new();
        for contract in import.watched_contracts {
            watched
                .entry(contract.contract_address)
                .or_default()
                .extend(contract.events);
        }

        Self {
            chain: import.chain,
            archive,
            decoder,
            start_block,
            watched,
            state: CrawlState::Init,
            pending: VecDeque::new(),
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Next event or checkpoint, `None` once the crawl is over. An error
    /// ends the crawl; checkpoints already yielded stay valid.
    pub async fn next_item(&mut self) -> Option<Result<CrawlItem, CrawlError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }
            match self.step().await {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.state = CrawlState::Done;
                    return Some(Err(e));
                }
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<CrawlItem, CrawlError>> + Send {
        stream::unfold(self, |mut crawler| async move {
            crawler.next_item().await.map(|item| (item, crawler))
        })
    }

    fn archive_error(&self, source: ArchiveError) -> CrawlError {
        CrawlError::Archive {
            chain: self.chain,
            source,
        }
    }

    /// Advances the state machine by one transition. Returns `false` once done.
    async fn step(&mut self) -> Result<bool, CrawlError> {
        let chain = self.chain;
        let state = std::mem::replace(&mut self.state, CrawlState::Done);

        self.state = match state {
            CrawlState::Done => return Ok(false),

            CrawlState::Init => {
                if self.archive.is_none() {
                    tracing::warn!(chain = %chain, "No archive configured, skipping chain");
                    CrawlState::Done
                } else if self.watched.is_empty() {
                    tracing::info!(chain = %chain, "No watched contracts");
                    CrawlState::Done
                } else {
                    CrawlState::FetchHeight {
                        next_block: self.start_block,
                    }
                }
            }

            CrawlState::FetchHeight { next_block } => {
                let Some(archive) = &self.archive else {
                    return Ok(false);
                };
                let last_block = archive.height().await.map_err(|e| self.archive_error(e))?;
                if next_block > last_block {
                    tracing::info!(
                        chain = %chain,
                        next_block,
                        last_block,
                        "Archive height not past checkpoint, nothing to crawl"
                    );
                    CrawlState::Done
                } else {
                    tracing::info!(chain = %chain, from = next_block, to = last_block, "Crawling archive");
                    CrawlState::FetchWorkerShard { next_block, last_block }
                }
            }

            CrawlState::FetchWorkerShard { next_block, last_block } => {
                let Some(archive) = &self.archive else {
                    return Ok(false);
                };
                let worker = archive
                    .worker_url(next_block)
                    .await
                    .map_err(|e| self.archive_error(e))?;
                let query = self.query(next_block, last_block);
                let blocks = archive
                    .query(&worker, &query)
                    .await
                    .map_err(|e| self.archive_error(e))?;
                CrawlState::DecodeAndEmit {
                    blocks,
                    next_block,
                    last_block,
                }
            }

            CrawlState::DecodeAndEmit {
                mut blocks,
                next_block,
                last_block,
            } => {
                blocks.sort_by_key(|b| b.header.number);
                let Some(last_processed) = blocks.last().map(|b| b.header.number) else {
                    tracing::warn!(chain = %chain, next_block, "Archive returned an empty page, stopping");
                    return Ok(false);
                };
                if last_processed < next_block {
                    tracing::warn!(
                        chain = %chain,
                        next_block,
                        last_processed,
                        "Archive page did not advance, stopping"
                    );
                    return Ok(false);
                }

                let events = self.decode_page(&blocks)?;
                tracing::debug!(
                    chain = %chain,
                    from = next_block,
                    to = last_processed,
                    events = events.len(),
                    "Decoded archive page"
                );
                self.pending.extend(events.into_iter().map(CrawlItem::Event));
                self.pending.push_back(CrawlItem::Checkpoint {
                    chain,
                    height: last_processed,
                });

                if last_processed < last_block {
                    CrawlState::FetchWorkerShard {
                        next_block: last_processed + 1,
                        last_block,
                    }
                } else {
                    CrawlState::Done
                }
            }
        };
        Ok(true)
    }

    fn query(&self, from_block: u64, to_block: u64) -> ArchiveQuery {
        let mut query = ArchiveQuery::new(from_block, to_block);
        for (address, events) in &self.watched {
            let topics: Vec<B256> = events.iter().filter_map(|e| self.decoder.topic0(*e)).collect();
            query = query.with_logs(*address, topics);
        }
        query
    }

    /// Decodes a whole page before anything is yielded, so a bad block
    /// never leaves half a page behind.
    fn decode_page(&self, blocks: &[ArchiveBlock]) -> Result<Vec<EventStreamRecord>, CrawlError> {
        let mut records = Vec::new();
        for block in blocks {
            let ctx = BlockContext {
                chain: self.chain,
                block_number: block.header.number,
                block_datetime: block.header.datetime().ok_or(CrawlError::BadBlockTimestamp {
                    chain: self.chain,
                    block: block.header.number,
                })?,
            };

            let reverted: HashSet<u64> = block
                .transactions
                .iter()
                .filter(|tx| tx.reverted())
                .map(|tx| tx.transaction_index)
                .collect();

            let mut logs: Vec<_> = block.logs.iter().collect();
            logs.sort_by_key(|l| l.log_index);
            for log in logs {
                if reverted.contains(&log.transaction_index) {
                    tracing::debug!(
                        chain = %self.chain,
                        block = ctx.block_number,
                        tx = %log.transaction_hash,
                        "Skipping log of reverted transaction"
                    );
                    continue;
                }
                let event = match self.decoder.decode(log, &ctx) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(
                            chain = %self.chain,
                            block = ctx.block_number,
                            log_index = log.log_index,
                            tx = %log.transaction_hash,
                            error = %e,
                            "Skipping undecodable log"
                        );
                        continue;
                    }
                };

                let wanted = self
                    .watched
                    .get(&event.contract_address)
                    .is_some_and(|events| events.contains(&event.data.event_type()));
                if !wanted {
                    continue;
                }
                records.push(EventStreamRecord::new(event));
            }
        }
        Ok(records)
    }
}
