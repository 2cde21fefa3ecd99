//! Timeout enforcement for chain calls.

use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Run a chain call with a deadline of `secs` seconds.
pub async fn with_timeout<T, F>(secs: u64, fut: F) -> BlockchainResult<T>
where
    F: Future<Output = BlockchainResult<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(BlockchainError::Timeout(secs)),
    }
}
