//! Chain-specific types and error definitions.

use alloy::primitives::{TxHash, B256};
use alloy::transports::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Blockchain identifier as used in the node's `/ext/bc/<id>` API path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockchainId(pub String);

impl BlockchainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockchainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BlockchainId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for BlockchainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fee conditions sampled from the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeConditions {
    /// Base fee of the latest block, in wei.
    pub base_fee: u128,
    /// Suggested priority fee (`eth_maxPriorityFeePerGas`), in wei.
    pub suggested_tip: u128,
}

/// The parts of a transaction receipt the submitter cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    /// Hash carried by the receiver's `ReceiveBlockHash` event, if one was emitted.
    pub published_hash: Option<B256>,
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Head subscription could not be opened or broke.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Node refused the transaction for a reason that will not go away on retry.
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Nonce already used, usually by a concurrent submission.
    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    /// Fee cap or tip below what the node accepts.
    #[error("Transaction underpriced: {0}")]
    Underpriced(String),

    /// Transaction was not included within the allowed wait.
    #[error("Transaction {0} not included within {1} seconds")]
    InclusionTimeout(TxHash, u64),

    /// Transaction was included but reverted.
    #[error("Transaction reverted: {0}")]
    Reverted(TxHash),

    /// Invalid private key format or signing error. Keys are checked at startup,
    /// so at publication time this is a signing failure and may be retried.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Block requested by height does not exist on the node.
    #[error("Block {0} not found")]
    MissingBlock(u64),
}

impl BlockchainError {
    /// Wrap a failed read call.
    pub fn rpc(context: &str, err: TransportError) -> Self {
        Self::Rpc(format!("{}: {}", context, err))
    }

    /// Classify a failed `eth_sendRawTransaction`.
    pub fn from_broadcast(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::from_rpc_message(&payload.message),
            None => Self::rpc("broadcast", err),
        }
    }

    /// Map a JSON-RPC error message returned for a broadcast.
    pub fn from_rpc_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("nonce too low")
            || lower.contains("already known")
            || lower.contains("nonce too high")
        {
            Self::NonceConflict(message.to_string())
        } else if lower.contains("underpriced") || lower.contains("less than block base fee") {
            Self::Underpriced(message.to_string())
        } else {
            Self::Rejected(message.to_string())
        }
    }

    /// Whether re-running build and submit with fresh chain state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Rpc(_)
                | Self::Timeout(_)
                | Self::Subscription(_)
                | Self::NonceConflict(_)
                | Self::Underpriced(_)
                | Self::MissingBlock(_)
                | Self::Wallet(_)
        )
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;
