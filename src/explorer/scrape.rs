//! HTML scraping for Blockscout deployments that only serve rendered pages.
//!
//! Every helper fails closed: a missing marker is an error, never a guess.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::datetime::parse_utc;

pub const TRANSACTION_HASH_LINK: &str = "transaction_hash_link";
const TX_HASH_SECTION: &str = "data-test=\"transaction_hash_link\"";
const TX_HREFS: &[&str] = &["href=\"/tx/", "href=\"/mainnet/tx/"];
const BLOCK_SECTION: &str = "class=\"transaction__link\"";
const BLOCK_HREFS: &[&str] = &["href=\"/block/", "href=\"/mainnet/block/"];
const LIST_BLOCK_HREF: &str = "href=\"/block/";
const FROM_NOW: &str = "data-from-now=\"";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("marker {0} not found")]
    MissingMarker(String),

    #[error("'{0}' is not a block number")]
    BadBlockNumber(String),

    #[error("'{0}' is not a timestamp")]
    BadTimestamp(String),
}

/// Text following the first occurrence of `marker`.
fn after<'a>(text: &'a str, marker: &str) -> Result<&'a str, ScrapeError> {
    text.find(marker)
        .map(|idx| &text[idx + marker.len()..])
        .ok_or_else(|| ScrapeError::MissingMarker(marker.to_string()))
}

/// Text following `marker` up to the next double quote. An unterminated
/// value counts as a missing marker.
fn quoted_after<'a>(text: &'a str, marker: &str) -> Result<&'a str, ScrapeError> {
    let rest = after(text, marker)?;
    let end = rest
        .find('"')
        .ok_or_else(|| ScrapeError::MissingMarker(format!("closing quote after {marker}")))?;
    Ok(&rest[..end])
}

/// Like `quoted_after`, trying each marker in order.
fn quoted_after_any<'a>(text: &'a str, markers: &[&str]) -> Result<&'a str, ScrapeError> {
    markers
        .iter()
        .find_map(|m| quoted_after(text, m).ok())
        .ok_or_else(|| ScrapeError::MissingMarker(markers.join(" | ")))
}

fn block_number(raw: &str) -> Result<u64, ScrapeError> {
    raw.trim()
        .parse()
        .map_err(|_| ScrapeError::BadBlockNumber(raw.to_string()))
}

fn from_now(text: &str) -> Result<DateTime<Utc>, ScrapeError> {
    let raw = quoted_after(text, FROM_NOW)?;
    parse_utc(raw).ok_or_else(|| ScrapeError::BadTimestamp(raw.to_string()))
}

/// Whether an address page links its creation transaction.
pub fn has_transaction_hash_link(page: &str) -> bool {
    page.contains(TRANSACTION_HASH_LINK)
}

/// Block number and timestamp of one transaction-list item.
pub fn transaction_list_item(html: &str) -> Result<(u64, DateTime<Utc>), ScrapeError> {
    let number = block_number(quoted_after(html, LIST_BLOCK_HREF)?)?;
    Ok((number, from_now(html)?))
}

/// Creation transaction hash from a legacy address page.
pub fn creation_tx_hash(address_page: &str) -> Result<String, ScrapeError> {
    let section = after(address_page, TX_HASH_SECTION)?;
    Ok(quoted_after_any(section, TX_HREFS)?.to_string())
}

/// Block number and timestamp from a legacy transaction page.
pub fn transaction_page(tx_page: &str) -> Result<(u64, DateTime<Utc>), ScrapeError> {
    let section = after(tx_page, BLOCK_SECTION)?;
    let number = block_number(quoted_after_any(section, BLOCK_HREFS)?)?;
    Ok((number, from_now(tx_page)?))
}
