//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relayer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Root configuration for the relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayerConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory holding persisted publish cursors.
    pub storage_location: PathBuf,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,

    /// Retry policy for publish attempts.
    pub retries: RetryConfig,

    /// Source subscription reconnect policy.
    pub watcher: WatcherConfig,

    /// Deadlines and gas settings for destination transactions.
    pub submission: SubmissionConfig,

    /// Chains whose block hashes are published.
    pub source_subnets: Vec<SourceSubnetConfig>,

    /// Chains receiving published hashes.
    pub destination_subnets: Vec<DestinationSubnetConfig>,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            storage_location: PathBuf::from(".relayer-storage"),
            metrics: MetricsConfig::default(),
            retries: RetryConfig::default(),
            watcher: WatcherConfig::default(),
            submission: SubmissionConfig::default(),
            source_subnets: Vec::new(),
            destination_subnets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of build + submit attempts per job.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Consecutive failed re-subscriptions before the source is given up.
    pub max_reconnect_attempts: u32,

    pub reconnect_base_delay_ms: u64,

    pub reconnect_max_delay_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 10,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Deadline for a single RPC call in seconds.
    pub rpc_timeout_secs: u64,

    /// How long to wait for a broadcast transaction to be included.
    pub receipt_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Gas limit of a `receiveBlockHash` call.
    pub gas_limit: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: 10,
            receipt_timeout_secs: 30,
            receipt_poll_interval_ms: 500,
            gas_limit: 100_000,
        }
    }
}

/// A chain whose blocks are observed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSubnetConfig {
    pub subnet_id: String,

    /// Blockchain ID used in the node API path.
    pub blockchain_id: String,

    pub api_node_host: String,

    pub api_node_port: u16,

    /// Use https/wss instead of http/ws.
    #[serde(default)]
    pub encrypt_connection: bool,

    /// Message protocols served for this source.
    #[serde(default)]
    pub message_contracts: Vec<MessageContractConfig>,
}

/// A message protocol entry on a source chain, tagged by its format.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "message_format", rename_all = "kebab-case")]
pub enum MessageContractConfig {
    /// Publish block hashes of the source chain to receiver contracts.
    BlockHashPublisher {
        /// Message contract address on the source chain (informational for this format).
        address: String,
        settings: BlockHashPublisherSettings,
    },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BlockHashPublisherSettings {
    pub destination_chains: Vec<DestinationDescriptor>,
}

/// One receiver of block hashes from the enclosing source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationDescriptor {
    /// Blockchain ID of a configured destination subnet.
    pub blockchain_id: String,

    /// Receiver contract address on that chain.
    pub address: String,

    /// Publish every `interval` source blocks.
    #[serde(deserialize_with = "deserialize_interval")]
    pub interval: u64,
}

/// A chain receiving block hashes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationSubnetConfig {
    pub subnet_id: String,

    pub blockchain_id: String,

    pub api_node_host: String,

    pub api_node_port: u16,

    #[serde(default)]
    pub encrypt_connection: bool,

    /// Hex-encoded private key of the paying account.
    #[serde(skip_serializing)]
    pub account_private_key: String,
}

/// Intervals are written either as integers or as decimal strings.
fn deserialize_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Interval {
        Number(u64),
        Text(String),
    }

    match Interval::deserialize(deserializer)? {
        Interval::Number(n) => Ok(n),
        Interval::Text(s) => s.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("interval '{}' is not a non-negative integer", s))
        }),
    }
}
