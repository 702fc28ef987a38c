//! Configuration types

use alloy_primitives::Address;
use ::config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::FeedParams;

/// Prefix for environment overrides, e.g. `PRICE_FEED__RPC__HTTP_URL`
pub const ENV_PREFIX: &str = "PRICE_FEED";

/// RPC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// One upstream aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub aggregator: Address,
    pub stale_after_secs: u64,
}

/// Feed constructor arguments plus an optional deployed instance to compare against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub base: SourceConfig,
    pub quote: SourceConfig,
    pub decimals: u8,
    #[serde(default)]
    pub deployed: Option<Address>,
}

impl FeedConfig {
    pub fn params(&self) -> FeedParams {
        FeedParams::new(self.base.aggregator, self.quote.aggregator, self.decimals)
            .with_stale_after(self.base.stale_after_secs, self.quote.stale_after_secs)
    }
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15_000, // roughly one mainnet block
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    pub rpc: RpcConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl FeedSettings {
    /// Load from an optional TOML file, then apply `PRICE_FEED__*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document with no environment overrides
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
