//! Block hash publishing relayer.
//!
//! Watches source chains and, every `interval` blocks, publishes the hash of
//! the current block to a receiver contract on a destination chain.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod publisher;
pub mod resilience;

pub use config::schema::RelayerConfig;
pub use lifecycle::Shutdown;
pub use publisher::{Orchestrator, RelayerHandle};
