//! Submitter: broadcast a signed publication and wait for its inclusion.
//!
//! # Design Decisions
//! - Canonicality is checked again right before broadcasting
//! - After an ambiguous broadcast failure the same signed bytes are re-sent;
//!   the transaction is never re-signed with a new nonce here
//! - Receipt lookups that fail are retried until the inclusion deadline

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use alloy::primitives::TxHash;

use crate::blockchain::client::{DestinationChain, SourceChain};
use crate::blockchain::types::BlockchainError;
use crate::blockchain::wallet::SignedTransaction;
use crate::publisher::builder::{ensure_canonical, SignedPublication};
use crate::publisher::error::PublishError;
use crate::resilience::backoff::Backoff;

/// Where a publication landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitterSettings {
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    /// Sends of the same signed bytes before the outcome is declared unknown.
    pub broadcast_attempts: u32,
}

impl Default for SubmitterSettings {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 30,
            receipt_poll_interval_ms: 500,
            broadcast_attempts: 3,
        }
    }
}

pub struct Submitter<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    settings: SubmitterSettings,
}

impl<S: SourceChain, D: DestinationChain> Submitter<S, D> {
    pub fn new(source: Arc<S>, destination: Arc<D>, settings: SubmitterSettings) -> Self {
        Self {
            source,
            destination,
            settings,
        }
    }

    pub async fn submit(&self, publication: &SignedPublication) -> Result<Inclusion, PublishError> {
        let block = &publication.job.block;
        ensure_canonical(self.source.as_ref(), block).await?;

        let tx_hash = self.broadcast(&publication.tx).await?;
        tracing::info!(
            target_key = %publication.job.target,
            height = block.height,
            tx_hash = %tx_hash,
            nonce = publication.tx.nonce,
            "Publication broadcast"
        );

        let inclusion = self.wait_for_inclusion(publication, tx_hash).await?;
        Ok(inclusion)
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxHash, PublishError> {
        let max_attempts = self.settings.broadcast_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.destination.send_raw_transaction(tx.raw.clone()).await {
                Ok(returned) => {
                    if returned != tx.tx_hash {
                        tracing::warn!(
                            expected = %tx.tx_hash,
                            returned = %returned,
                            "Node returned an unexpected transaction hash"
                        );
                    }
                    return Ok(tx.tx_hash);
                }
                // An earlier send that looked failed did reach the node
                Err(BlockchainError::NonceConflict(message)) if attempt > 1 => {
                    tracing::debug!(tx_hash = %tx.tx_hash, %message, "Transaction already known");
                    return Ok(tx.tx_hash);
                }
                Err(e @ (BlockchainError::Rpc(_) | BlockchainError::Timeout(_))) => {
                    // Outcome unknown: only these exact bytes may be sent again
                    if attempt >= max_attempts {
                        return Err(PublishError::Unconfirmed {
                            tx_hash: tx.tx_hash,
                            cause: e,
                        });
                    }
                    tracing::warn!(
                        tx_hash = %tx.tx_hash,
                        attempt,
                        error = %e,
                        "Broadcast failed, re-sending"
                    );
                    Backoff::new(
                        self.settings.receipt_poll_interval_ms,
                        self.settings.receipt_timeout_secs.saturating_mul(1000),
                    )
                    .sleep(attempt)
                    .await;
                }
                Err(e) if attempt > 1 => {
                    return Err(PublishError::Unconfirmed {
                        tx_hash: tx.tx_hash,
                        cause: e,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn wait_for_inclusion(
        &self,
        publication: &SignedPublication,
        tx_hash: TxHash,
    ) -> Result<Inclusion, PublishError> {
        let deadline = Duration::from_secs(self.settings.receipt_timeout_secs);
        let poll_interval = Duration::from_millis(self.settings.receipt_poll_interval_ms.max(1));

        let result = timeout(deadline, async {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let receipt = match self.destination.transaction_receipt(tx_hash).await {
                    Ok(Some(r)) => r,
                    Ok(None) => {
                        tracing::trace!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed");
                        continue;
                    }
                };

                if !receipt.success {
                    return Err(PublishError::from(BlockchainError::Reverted(tx_hash)));
                }

                let expected = publication.job.block.hash;
                if let Some(published) = receipt.published_hash.filter(|h| *h != expected) {
                    tracing::warn!(
                        tx_hash = %tx_hash,
                        expected = %expected,
                        emitted = %published,
                        "Receiver emitted a different block hash"
                    );
                }

                return Ok(Inclusion {
                    tx_hash,
                    block_number: receipt.block_number,
                });
            }
        })
        .await;

        match result {
            Ok(inclusion) => inclusion,
            Err(_) => Err(BlockchainError::InclusionTimeout(
                tx_hash,
                self.settings.receipt_timeout_secs,
            )
            .into()),
        }
    }
}
