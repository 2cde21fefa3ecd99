//! Values flowing through the publishing pipeline.

use alloy::primitives::{Address, TxHash, B256};
use alloy::rpc::types::Header;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use crate::blockchain::types::BlockchainId;
use crate::blockchain::wallet::Wallet;
use crate::publisher::error::ErrorKind;

/// One block seen on a source chain. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockObservation {
    pub height: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
}

impl From<&Header> for BlockObservation {
    fn from(header: &Header) -> Self {
        Self {
            height: header.number,
            hash: header.hash,
            parent_hash: header.parent_hash,
            timestamp: header.timestamp,
        }
    }
}

/// Node API location of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub subnet_id: String,
    pub blockchain_id: BlockchainId,
    pub host: String,
    pub port: u16,
    pub encrypt_connection: bool,
}

/// A chain whose block hashes are published.
pub type SourceEndpoint = ChainEndpoint;

impl ChainEndpoint {
    /// JSON-RPC endpoint, `http(s)://host:port/ext/bc/<id>/rpc`.
    pub fn rpc_url(&self) -> String {
        let scheme = if self.encrypt_connection { "https" } else { "http" };
        format!(
            "{}://{}:{}/ext/bc/{}/rpc",
            scheme, self.host, self.port, self.blockchain_id
        )
    }

    /// WebSocket endpoint, `ws(s)://host:port/ext/bc/<id>/ws`.
    pub fn ws_url(&self) -> String {
        let scheme = if self.encrypt_connection { "wss" } else { "ws" };
        format!(
            "{}://{}:{}/ext/bc/{}/ws",
            scheme, self.host, self.port, self.blockchain_id
        )
    }
}

/// Identity of a publishing destination: which source feeds which receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub source: BlockchainId,
    pub destination: BlockchainId,
    pub receiver: Address,
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.destination, self.receiver)
    }
}

impl FromStr for TargetKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(destination), Some(receiver))
                if !source.is_empty() && !destination.is_empty() =>
            {
                let receiver = receiver
                    .parse()
                    .map_err(|e| format!("invalid receiver in target key '{}': {}", s, e))?;
                Ok(Self {
                    source: source.into(),
                    destination: destination.into(),
                    receiver,
                })
            }
            _ => Err(format!("malformed target key '{}'", s)),
        }
    }
}

/// One publishing destination registered against a source chain.
#[derive(Debug, Clone)]
pub struct DestinationTarget {
    pub source: BlockchainId,
    pub destination: ChainEndpoint,
    /// Receiver contract on the destination chain.
    pub receiver: Address,
    /// Source blocks between publications.
    pub interval: NonZeroU64,
    /// Account paying for publications; bound to the destination's EVM chain ID.
    pub wallet: Wallet,
}

impl DestinationTarget {
    pub fn key(&self) -> TargetKey {
        TargetKey {
            source: self.source.clone(),
            destination: self.destination.blockchain_id.clone(),
            receiver: self.receiver,
        }
    }
}

/// Work item created when a cursor reaches its interval. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishJob {
    pub target: TargetKey,
    pub block: BlockObservation,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The block left the canonical chain before it could be published.
    Discarded,
    Failed { kind: ErrorKind, cause: String },
}

impl PublishOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Discarded => "discarded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Terminal report for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub job: PublishJob,
    pub tx_hash: Option<TxHash>,
    pub inclusion_block: Option<u64>,
    pub attempts: u32,
    pub outcome: PublishOutcome,
}
