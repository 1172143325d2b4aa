use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Raw `contract_metadata_watchlist` row: `(chain, contract_address)`.
pub type ContractWatchRow = (String, String);

/// Raw `event_indexer_watchlist` row:
/// `(chain, contract_address, events, creation_block_number, creation_block_datetime)`.
pub type EventWatchRow = (String, String, Vec<String>, i64, DateTime<Utc>);

pub async fn connect(config: &DatabaseConfig) -> eyre::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;
    tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Contracts whose creation block should be looked up.
pub async fn fetch_contract_watchlist(pool: &PgPool) -> eyre::Result<Vec<ContractWatchRow>> {
    let rows: Vec<ContractWatchRow> = sqlx::query_as(
        "SELECT chain::text, contract_address::text
         FROM analytics.contract_metadata_watchlist",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Contracts and events the archive crawler should collect.
pub async fn fetch_event_watchlist(pool: &PgPool) -> eyre::Result<Vec<EventWatchRow>> {
    let rows: Vec<EventWatchRow> = sqlx::query_as(
        "SELECT chain::text,
                contract_address::text,
                events::text[],
                creation_block_number::bigint,
                creation_block_datetime::timestamptz
         FROM analytics.event_indexer_watchlist",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
