use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::address::{self, AddressError, Network};

/// Env var holding the hex treasury key the payout address is derived from
pub const PRIVATE_KEY_ENV: &str = "TREASURY_PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config lists no kaspad node")]
    NoNode,
    #[error("first kaspad node entry is empty")]
    EmptyNode,
    #[error("unknown network '{0}' (expected mainnet, testnet-10, testnet-11, devnet or simnet)")]
    UnknownNetwork(String),
    #[error("invalid block_wait_time_seconds '{0}': must be a positive integer")]
    InvalidWaitTime(String),
    #[error("invalid {0}: must be a positive integer")]
    InvalidInterval(&'static str),
    #[error("redis_address is empty")]
    EmptyRedisAddress,
    #[error("redis_channel is empty")]
    EmptyChannel,
    #[error("no payout source: set {} or payout_address", PRIVATE_KEY_ENV)]
    MissingPayoutSource,
    #[error("failed to derive payout address: {0}")]
    Address(#[from] AddressError),
}

/// Seconds given either as a JSON string or a number
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn positive(&self) -> Option<u64> {
        match self {
            Seconds::Number(n) => u64::try_from(*n).ok(),
            Seconds::Text(s) => s.trim().parse::<u64>().ok(),
        }
        .filter(|n| *n > 0)
    }

    fn raw(&self) -> String {
        match self {
            Seconds::Number(n) => n.to_string(),
            Seconds::Text(s) => s.clone(),
        }
    }
}

/// Config file as written on disk
///
/// Only the first `node` entry is used; the rest are accepted and ignored.
#[derive(Deserialize, Clone, Debug)]
pub struct BridgeConfig {
    #[serde(rename = "node")]
    pub nodes: Vec<String>,
    pub network: String,
    pub block_wait_time_seconds: Seconds,
    pub redis_address: String,
    pub redis_channel: String,
    #[serde(default = "default_status_interval")]
    pub status_interval_seconds: u64,
    #[serde(default = "default_extra_data")]
    pub extra_data: String,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_seconds: u64,
    #[serde(default)]
    pub metrics_listen: Option<String>,
    #[serde(default)]
    pub payout_address: Option<String>,
}

fn default_status_interval() -> u64 { 5 }
fn default_extra_data() -> String { "Katpool".to_string() }
fn default_rpc_timeout() -> u64 { 30 }

/// Validated, immutable runtime settings
#[derive(Clone, Debug)]
pub struct Settings {
    pub node_url: String,
    pub network: Network,
    pub block_wait_time: Duration,
    pub redis_url: String,
    pub redis_channel: String,
    pub status_interval: Duration,
    pub extra_data: String,
    pub rpc_timeout: Duration,
    pub metrics_listen: Option<String>,
    pub payout_address: String,
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&txt)
    }

    pub fn from_json(txt: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(txt)?)
    }

    /// Validate every field and resolve the payout address.
    ///
    /// A private key, when given, wins over `payout_address`.
    pub fn validate(self, private_key: Option<&Zeroizing<String>>) -> Result<Settings, ConfigError> {
        let node_url = self.nodes.first().ok_or(ConfigError::NoNode)?.trim().to_string();
        if node_url.is_empty() {
            return Err(ConfigError::EmptyNode);
        }

        let network: Network = self
            .network
            .parse()
            .map_err(ConfigError::UnknownNetwork)?;

        let wait_secs = self
            .block_wait_time_seconds
            .positive()
            .ok_or_else(|| ConfigError::InvalidWaitTime(self.block_wait_time_seconds.raw()))?;

        if self.status_interval_seconds == 0 {
            return Err(ConfigError::InvalidInterval("status_interval_seconds"));
        }
        if self.rpc_timeout_seconds == 0 {
            return Err(ConfigError::InvalidInterval("rpc_timeout_seconds"));
        }

        let redis_address = self.redis_address.trim();
        if redis_address.is_empty() {
            return Err(ConfigError::EmptyRedisAddress);
        }
        if self.redis_channel.trim().is_empty() {
            return Err(ConfigError::EmptyChannel);
        }

        let payout_address = match (private_key, &self.payout_address) {
            (Some(key), _) if !key.trim().is_empty() => address::payout_address(network, key)?,
            (_, Some(addr)) => {
                address::validate_address(network, addr)?;
                addr.clone()
            }
            _ => return Err(ConfigError::MissingPayoutSource),
        };

        Ok(Settings {
            node_url,
            network,
            block_wait_time: Duration::from_secs(wait_secs),
            redis_url: redis_url(redis_address),
            redis_channel: self.redis_channel,
            status_interval: Duration::from_secs(self.status_interval_seconds),
            extra_data: self.extra_data,
            rpc_timeout: Duration::from_secs(self.rpc_timeout_seconds),
            metrics_listen: self.metrics_listen,
            payout_address,
        })
    }
}

/// Read the treasury key from the environment, if set
pub fn private_key_from_env() -> Option<Zeroizing<String>> {
    std::env::var(PRIVATE_KEY_ENV).ok().map(Zeroizing::new)
}

/// `host:port` becomes `redis://host:port/`; URLs pass through
fn redis_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}/", address)
    }
}
