use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chain::Chain;
use crate::explorer::{explorer_config, ExplorerConfig};
use crate::fanout::WorkerFailurePolicy;
use crate::http::{HttpClientConfig, RetryConfig};
use crate::indexer::networks;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub watch_list: WatchListConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub fan_out: FanOutConfig,
    #[serde(default)]
    pub abi: AbiConfig,
    /// Per-chain overrides keyed by chain name.
    #[serde(default)]
    pub chains: HashMap<String, ChainOverride>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

// ============================================================
// Watch list
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchListKind {
    #[default]
    Postgres,
    Csv,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WatchListConfig {
    #[serde(default)]
    pub source: WatchListKind,
    pub contracts_csv: Option<PathBuf>,
    pub events_csv: Option<PathBuf>,
}

// ============================================================
// HTTP
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_backoff_factor_secs")]
    pub backoff_factor_secs: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            backoff_factor_secs: default_backoff_factor_secs(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_factor_secs() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FanOutConfig {
    #[serde(default)]
    pub failure_policy: WorkerFailurePolicy,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AbiConfig {
    /// Directory holding `IERC20.json`, `BeefyZapRouter.json` and
    /// `BeefyVaultV7.json`. The bundled copies are used when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainOverride {
    pub min_seconds_between_requests: Option<u64>,
    pub archive_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Reads `path`, or falls back to the defaults when it does not exist.
    pub fn load(path: &str) -> eyre::Result<Self> {
        if !Path::new(path).exists() {
            tracing::info!(path, "No config file, using defaults");
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.watch_list.source == WatchListKind::Csv
            && (self.watch_list.contracts_csv.is_none() || self.watch_list.events_csv.is_none())
        {
            return Err(eyre::eyre!(
                "watch_list.source = \"csv\" requires both contracts_csv and events_csv"
            ));
        }

        if self.http.connect_timeout_secs == 0 || self.http.read_timeout_secs == 0 {
            return Err(eyre::eyre!("HTTP timeouts must be greater than zero"));
        }
        if self.http.retry_attempts == 0 {
            return Err(eyre::eyre!("http.retry_attempts must be at least 1"));
        }
        if !self.http.backoff_factor_secs.is_finite() || self.http.backoff_factor_secs < 0.0 {
            return Err(eyre::eyre!(
                "Invalid http.backoff_factor_secs {}",
                self.http.backoff_factor_secs
            ));
        }

        for (name, chain) in &self.chains {
            if name.parse::<Chain>().is_err() {
                return Err(eyre::eyre!("Unknown chain '{}' in [chains]", name));
            }
            if let Some(url) = &chain.archive_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(eyre::eyre!("Invalid archive_url '{}' for chain '{}'", url, name));
                }
            }
        }
        Ok(())
    }

    /// `[database]`, or `DATABASE_URL` from the environment.
    pub fn database(&self) -> eyre::Result<DatabaseConfig> {
        if let Some(db) = &self.database {
            return Ok(db.clone());
        }
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            eyre::eyre!("Postgres watch list needs a [database] section or DATABASE_URL")
        })?;
        Ok(DatabaseConfig {
            url,
            max_connections: default_max_connections(),
        })
    }

    fn chain_override(&self, chain: Chain) -> Option<&ChainOverride> {
        self.chains
            .iter()
            .find(|(name, _)| name.parse::<Chain>().ok() == Some(chain))
            .map(|(_, o)| o)
    }

    pub fn chain_enabled(&self, chain: Chain) -> bool {
        self.chain_override(chain).map_or(true, |o| o.enabled)
    }

    /// Base HTTP settings every client starts from.
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.http.read_timeout_secs),
            retry: RetryConfig {
                max_attempts: self.http.retry_attempts,
                backoff_factor: Duration::from_secs_f64(self.http.backoff_factor_secs),
                ..RetryConfig::default()
            },
            ..HttpClientConfig::default()
        }
    }

    /// Registry entry of `chain` with the configured interval applied.
    pub fn explorer_config(&self, chain: Chain) -> ExplorerConfig {
        let mut explorer = explorer_config(chain);
        if let Some(secs) = self.chain_override(chain).and_then(|o| o.min_seconds_between_requests) {
            explorer.min_seconds_between_requests = secs;
        }
        explorer
    }

    pub fn archive_url(&self, chain: Chain) -> Option<String> {
        self.chain_override(chain)
            .and_then(|o| o.archive_url.clone())
            .or_else(|| networks::archive_url(chain))
    }
}
