//! Blockscout deployments without a JSON API: the paginated transaction list
//! (`?type=JSON` pages of rendered HTML fragments) and the legacy rendered
//! address/transaction pages.

use async_trait::async_trait;
use serde::Deserialize;

use super::scrape;
use super::{ContractCreationInfo, ContractWatch, ExplorerClient, ExplorerError, ExplorerType};
use crate::http::HttpClient;

/// Upper bound on followed pages, guards against a `next_page_path` cycle.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct TransactionListPage {
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    next_page_path: Option<String>,
}

fn with_json_type(url: String) -> String {
    if url.contains("type=JSON") {
        url
    } else if url.contains('?') {
        format!("{url}&type=JSON")
    } else {
        format!("{url}?type=JSON")
    }
}

/// Walks the transaction list to its last page; the oldest transaction (last
/// item of the last page) is the creation.
async fn creation_from_transaction_list(
    http: &HttpClient,
    base_url: &str,
    contract: &ContractWatch,
    explorer: ExplorerType,
) -> Result<ContractCreationInfo, ExplorerError> {
    let mut path = Some(format!(
        "/address/{}/transactions",
        contract.contract_address.to_checksum(None)
    ));
    let mut last_page = TransactionListPage {
        items: Vec::new(),
        next_page_path: None,
    };
    let mut pages = 0;

    while let Some(next) = path.filter(|p| !p.is_empty()) {
        pages += 1;
        if pages > MAX_PAGES {
            return Err(ExplorerError::payload(
                explorer,
                format!("transaction list longer than {MAX_PAGES} pages"),
            ));
        }
        let url = with_json_type(format!("{base_url}{next}"));
        last_page = http
            .get(url)
            .await?
            .json()
            .map_err(|e| ExplorerError::payload(explorer, e))?;
        path = last_page.next_page_path.take();
    }

    tracing::debug!(
        chain = %contract.chain,
        contract = %contract.contract_address,
        pages,
        "Walked transaction list"
    );

    let oldest = last_page
        .items
        .last()
        .ok_or_else(|| ExplorerError::payload(explorer, "transaction list is empty"))?;
    let (block_number, block_datetime) = scrape::transaction_list_item(oldest)
        .map_err(|source| ExplorerError::Scrape { explorer, source })?;

    Ok(ContractCreationInfo::new(contract, block_number, block_datetime))
}

pub struct TransactionListClient {
    base_url: String,
    http: HttpClient,
}

impl TransactionListClient {
    pub fn new(base_url: String, http: HttpClient) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ExplorerClient for TransactionListClient {
    fn explorer_type(&self) -> ExplorerType {
        ExplorerType::BlockscoutTrxListApi
    }

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError> {
        creation_from_transaction_list(&self.http, &self.base_url, contract, self.explorer_type()).await
    }
}

/// Legacy rendered Blockscout. Verified contracts link their creation
/// transaction on the address page; the rest fall back to the transaction list.
pub struct BlockscoutHtmlClient {
    base_url: String,
    http: HttpClient,
}

impl BlockscoutHtmlClient {
    pub fn new(base_url: String, http: HttpClient) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ExplorerClient for BlockscoutHtmlClient {
    fn explorer_type(&self) -> ExplorerType {
        ExplorerType::Blockscout
    }

    async fn get_contract_creation_info(
        &self,
        contract: &ContractWatch,
    ) -> Result<ContractCreationInfo, ExplorerError> {
        let explorer = self.explorer_type();
        let address_page = self
            .http
            .get(format!(
                "{}/address/{}",
                self.base_url,
                contract.contract_address.to_checksum(None)
            ))
            .await?;

        if !scrape::has_transaction_hash_link(address_page.text()) {
            tracing::debug!(
                chain = %contract.chain,
                contract = %contract.contract_address,
                "No creation link on address page, walking transaction list"
            );
            return creation_from_transaction_list(&self.http, &self.base_url, contract, explorer).await;
        }

        let tx_hash = scrape::creation_tx_hash(address_page.text())
            .map_err(|source| ExplorerError::Scrape { explorer, source })?;
        let tx_page = self
            .http
            .get(format!("{}/tx/{}", self.base_url, tx_hash))
            .await?;
        let (block_number, block_datetime) = scrape::transaction_page(tx_page.text())
            .map_err(|source| ExplorerError::Scrape { explorer, source })?;

        Ok(ContractCreationInfo::new(contract, block_number, block_datetime))
    }
}
