use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use databarn_extract::chain::Chain;
use databarn_extract::config::Config;
use databarn_extract::explorer::{self, ContractWatch};
use databarn_extract::fanout::FanOutSummary;
use databarn_extract::indexer::{AbiSet, EventDecoder};
use databarn_extract::sink::SingerSink;
use databarn_extract::state::CheckpointState;
use databarn_extract::streams;
use databarn_extract::watch::WatchListSource;

#[derive(Debug, Parser)]
#[command(name = "databarn-extract", version, about = "Extracts contract metadata and events for the databarn")]
struct Cli {
    /// TOML config file. Defaults apply when it does not exist.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Singer state file to resume the event crawl from.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Only process these chains (repeatable).
    #[arg(long = "chain")]
    chains: Vec<Chain>,

    /// Log as JSON lines instead of text.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Emit the `contract_creation_date` stream.
    CreationInfo,
    /// Emit the `squid_event_stream` stream.
    ContractEvents,
    /// Look up one contract's creation block, repeatedly.
    ShowCreation {
        #[arg(long)]
        chain: Chain,
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 3)]
        times: usize,
    },
}

fn init_tracing(json: bool) {
    // stdout carries the record stream, logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Keeps the watch list entries the run should process.
fn selected(chain: Chain, only: &BTreeSet<Chain>, config: &Config) -> bool {
    (only.is_empty() || only.contains(&chain)) && config.chain_enabled(chain)
}

fn report(summary: &FanOutSummary) {
    for failure in &summary.failed {
        tracing::warn!(
            worker = %failure.label,
            error = %failure.error,
            panicked = failure.panicked,
            "Chain did not complete"
        );
    }
    tracing::info!(
        workers = summary.workers,
        completed = summary.completed,
        failed = summary.failed.len(),
        cancelled = summary.cancelled,
        "Run finished"
    );
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load(&cli.config)?;
    tracing::info!(path = %cli.config, "Configuration loaded");

    let only: BTreeSet<Chain> = cli.chains.iter().copied().collect();

    // Ctrl+C cancels every worker.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received, stopping workers...");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::CreationInfo => {
            let source = WatchListSource::from_config(&config).await?;
            let watches: Vec<ContractWatch> = source
                .contracts()
                .await?
                .into_iter()
                .filter(|w| selected(w.chain, &only, &config))
                .collect();

            let chains: BTreeSet<Chain> = watches.iter().map(|w| w.chain).collect();
            let explorers = streams::resolve_explorers(chains, &config);

            let mut sink = SingerSink::stdout();
            let summary = streams::sync_creation_info(
                watches,
                &explorers,
                config.fan_out.failure_policy,
                &mut sink,
                &cancel,
            )
            .await?;
            report(&summary);
        }

        Command::ContractEvents => {
            let mut state = CheckpointState::load(cli.state.as_deref())?;
            let source = WatchListSource::from_config(&config).await?;
            let watches = source
                .event_watches()
                .await?
                .into_iter()
                .filter(|w| selected(w.chain, &only, &config))
                .collect();

            let abis = AbiSet::load(config.abi.dir.as_deref())?;
            let decoder = Arc::new(EventDecoder::from_abis(&abis)?);

            let imports = streams::build_import_states(watches, &state);
            let archives = streams::archive_clients(imports.iter().map(|i| i.chain), &config)?;

            let mut sink = SingerSink::stdout();
            let summary = streams::sync_contract_events(
                imports,
                &archives,
                decoder,
                config.fan_out.failure_policy,
                &mut sink,
                &mut state,
                &cancel,
            )
            .await?;
            report(&summary);
        }

        Command::ShowCreation { chain, address, times } => {
            let contract = ContractWatch {
                chain,
                contract_address: address
                    .parse::<Address>()
                    .map_err(|e| eyre::eyre!("Invalid contract address '{}': {}", address, e))?,
            };
            let client = explorer::resolve(&config.explorer_config(chain), &config.http_client_config())?;

            for attempt in 1..=times {
                if cancel.is_cancelled() {
                    break;
                }
                let started = Instant::now();
                let info = client.get_contract_creation_info(&contract).await?;
                tracing::info!(
                    chain = %chain,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Creation info fetched"
                );
                println!("{}", serde_json::to_string(&info)?);
            }
        }
    }

    Ok(())
}
