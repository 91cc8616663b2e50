// Configuration for the sync daemon:
// - Node RPC endpoint and credentials
// - Database connection string
// - RPC timeout/retry budget
// - Sync loop pacing, block retry policy and reorg safety margin

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause after a height was advanced.
    pub poll_interval: Duration,
    /// Pause when the ledger has caught up with the confirmed tip.
    pub idle_interval: Duration,
    /// Pause after an iteration failed.
    pub error_pause: Duration,
    pub block_retry_delay: Duration,
    pub block_retry_max_delay: Duration,
    /// Attempts per height before it is dead-lettered; 0 retries forever.
    pub block_max_attempts: usize,
    /// Confirmations a height needs before it is indexed.
    pub reorg_safety: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(5),
            error_pause: Duration::from_secs(5),
            block_retry_delay: Duration::from_secs(5),
            block_retry_max_delay: Duration::from_secs(300),
            block_max_attempts: 10,
            reorg_safety: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub rpc: RpcConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let mut rpc = RpcConfig::new(
            required("ZCASH_RPC_URL")?,
            required("ZCASH_RPC_USER")?,
            required("ZCASH_RPC_PASSWORD")?,
        );
        let mut sync = SyncConfig::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "RPC_TIMEOUT_SECS")? {
            rpc.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var(&lookup, "RPC_MAX_RETRIES")? {
            rpc.max_retries = retries;
        }
        if let Some(ms) = parse_var(&lookup, "RPC_RETRY_DELAY_MS")? {
            rpc.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "POLL_INTERVAL_MS")? {
            sync.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "IDLE_INTERVAL_SECS")? {
            sync.idle_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "ERROR_PAUSE_SECS")? {
            sync.error_pause = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "BLOCK_RETRY_DELAY_SECS")? {
            sync.block_retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "BLOCK_RETRY_MAX_DELAY_SECS")? {
            sync.block_retry_max_delay = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var(&lookup, "BLOCK_MAX_ATTEMPTS")? {
            sync.block_max_attempts = attempts;
        }
        if let Some(depth) = parse_var(&lookup, "REORG_SAFETY")? {
            sync.reorg_safety = depth;
        }
        let db_max_connections = parse_var(&lookup, "DB_MAX_CONNECTIONS")?.unwrap_or(5);

        Ok(Self {
            database_url,
            db_max_connections,
            rpc,
            sync,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
