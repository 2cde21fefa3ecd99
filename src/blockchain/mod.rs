//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Relayer configuration (endpoints, private keys)
//!     → wallet.rs (key loading, EIP-1559 signing)
//!     → client.rs (source heads / destination RPC, deadlines on every call)
//!     → abi.rs (receiver contract calldata and events)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod abi;
pub mod client;
pub mod types;
pub mod wallet;

pub use client::{BlockStream, DestinationChain, DestinationRpcClient, SourceChain, SourceRpcClient};
pub use types::{BlockchainError, BlockchainId, BlockchainResult, FeeConditions, ReceiptSummary};
pub use wallet::{SignedTransaction, Wallet};
