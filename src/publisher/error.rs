//! Publishing errors and their classification.

use alloy::primitives::{TxHash, B256};
use thiserror::Error;

use crate::blockchain::types::BlockchainError;

/// Broad failure classes, used for logging, metrics and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source or destination RPC unreachable or too slow.
    Connectivity,
    /// The job's block is no longer canonical.
    ChainState,
    /// The destination refused, dropped or reverted the transaction.
    Transaction,
    /// Keys or chain identity do not match the configuration.
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::ChainState => "chain_state",
            Self::Transaction => "transaction",
            Self::Configuration => "configuration",
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// The block was replaced by a reorg; the job is dropped without sending anything.
    #[error("block {height} hash {observed} is no longer canonical (now {canonical})")]
    StaleBlock {
        height: u64,
        observed: B256,
        canonical: B256,
    },

    /// Broadcast outcome unknown after repeated transport failures. The transaction
    /// may still land, so it is never rebuilt with a fresh nonce.
    #[error("broadcast of {tx_hash} unconfirmed: {cause}")]
    Unconfirmed {
        tx_hash: TxHash,
        cause: BlockchainError,
    },

    #[error(transparent)]
    Chain(#[from] BlockchainError),
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StaleBlock { .. } => ErrorKind::ChainState,
            Self::Unconfirmed { .. } => ErrorKind::Transaction,
            Self::Chain(e) => match e {
                BlockchainError::Rpc(_)
                | BlockchainError::Timeout(_)
                | BlockchainError::Subscription(_)
                | BlockchainError::MissingBlock(_) => ErrorKind::Connectivity,
                BlockchainError::Rejected(_)
                | BlockchainError::NonceConflict(_)
                | BlockchainError::Underpriced(_)
                | BlockchainError::InclusionTimeout(..)
                | BlockchainError::Reverted(_) => ErrorKind::Transaction,
                BlockchainError::Wallet(_) | BlockchainError::ChainMismatch { .. } => {
                    ErrorKind::Configuration
                }
            },
        }
    }

    /// Whether the full build + submit cycle should be run again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StaleBlock { .. } | Self::Unconfirmed { .. } => false,
            Self::Chain(e) => e.is_retryable(),
        }
    }

    /// Transaction hash involved in the failure, when one was broadcast.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
            Self::Chain(BlockchainError::InclusionTimeout(tx_hash, _))
            | Self::Chain(BlockchainError::Reverted(tx_hash)) => Some(*tx_hash),
            _ => None,
        }
    }
}
