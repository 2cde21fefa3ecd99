//! Per-target Build + Submit with bounded retries, and the worker that drives it.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::blockchain::client::{DestinationChain, SourceChain};
use crate::blockchain::types::BlockchainId;
use crate::observability::metrics;
use crate::publisher::builder::TransactionBuilder;
use crate::publisher::cursor_store::CursorStore;
use crate::publisher::error::PublishError;
use crate::publisher::interval::PublishedBlock;
use crate::publisher::submitter::{Inclusion, Submitter};
use crate::publisher::types::{PublishJob, PublishOutcome, SubmissionResult, TargetKey};
use crate::resilience::retries::RetryPolicy;

/// One async lock per (destination chain, account).
///
/// Targets paying from the same account hold it for a whole job, so nonces are
/// read and consumed one job at a time.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    inner: Arc<DashMap<(BlockchainId, Address), Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn lock_for(&self, chain: &BlockchainId, account: Address) -> Arc<Mutex<()>> {
        self.inner
            .entry((chain.clone(), account))
            .or_default()
            .value()
            .clone()
    }
}

pub struct PublishPipeline<S, D> {
    key: TargetKey,
    builder: TransactionBuilder<S, D>,
    submitter: Submitter<S, D>,
    retry: RetryPolicy,
    account_lock: Arc<Mutex<()>>,
    store: CursorStore,
}

impl<S: SourceChain, D: DestinationChain> PublishPipeline<S, D> {
    pub fn new(
        builder: TransactionBuilder<S, D>,
        submitter: Submitter<S, D>,
        retry: RetryPolicy,
        locks: &AccountLocks,
        store: CursorStore,
    ) -> Self {
        let key = builder.target().key();
        let account_lock = locks.lock_for(&key.destination, builder.account());
        Self {
            key,
            builder,
            submitter,
            retry,
            account_lock,
            store,
        }
    }

    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    /// Run one job to a terminal result. Never panics on chain errors.
    pub async fn publish(&self, job: PublishJob) -> SubmissionResult {
        let started = Instant::now();
        let destination = self.key.destination.as_str();
        let _account = self.account_lock.lock().await;

        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            metrics::record_submission_attempt(destination);

            match self.attempt(&job).await {
                Ok(inclusion) => break Ok(inclusion),
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        target_key = %self.key,
                        height = job.block.height,
                        attempt,
                        kind = e.kind().as_str(),
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Publish attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        let report = match result {
            Ok(inclusion) => {
                tracing::info!(
                    target_key = %self.key,
                    height = job.block.height,
                    block_hash = %job.block.hash,
                    tx_hash = %inclusion.tx_hash,
                    inclusion_block = inclusion.block_number,
                    attempts = attempt,
                    "Block hash published"
                );
                self.store.record_published(
                    &self.key,
                    PublishedBlock {
                        height: job.block.height,
                        hash: job.block.hash,
                        tx_hash: inclusion.tx_hash,
                        inclusion_block: inclusion.block_number,
                    },
                );
                if let Err(e) = self.store.persist().await {
                    tracing::warn!(error = %e, "Failed to persist publish cursors");
                }
                SubmissionResult {
                    job,
                    tx_hash: Some(inclusion.tx_hash),
                    inclusion_block: Some(inclusion.block_number),
                    attempts: attempt,
                    outcome: PublishOutcome::Published,
                }
            }
            Err(PublishError::StaleBlock { height, observed, canonical }) => {
                tracing::info!(
                    target_key = %self.key,
                    height,
                    block_hash = %observed,
                    canonical = %canonical,
                    "Block reorganized away, publication discarded"
                );
                SubmissionResult {
                    job,
                    tx_hash: None,
                    inclusion_block: None,
                    attempts: attempt,
                    outcome: PublishOutcome::Discarded,
                }
            }
            Err(e) => {
                tracing::error!(
                    target_key = %self.key,
                    height = job.block.height,
                    attempts = attempt,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Publication failed"
                );
                SubmissionResult {
                    job,
                    tx_hash: e.tx_hash(),
                    inclusion_block: None,
                    attempts: attempt,
                    outcome: PublishOutcome::Failed {
                        kind: e.kind(),
                        cause: e.to_string(),
                    },
                }
            }
        };

        metrics::record_publication(destination, report.outcome.label());
        metrics::record_publish_latency(destination, started);
        report
    }

    async fn attempt(&self, job: &PublishJob) -> Result<Inclusion, PublishError> {
        let publication = self.builder.build(job).await?;
        self.submitter.submit(&publication).await
    }
}

/// Serially publish the jobs of one target until shutdown or until the job queue closes.
///
/// Queued jobs left at shutdown are dropped; an in-flight job is abandoned.
pub async fn run_worker<S: SourceChain, D: DestinationChain>(
    pipeline: PublishPipeline<S, D>,
    mut jobs: mpsc::UnboundedReceiver<PublishJob>,
    mut shutdown: broadcast::Receiver<()>,
    results: broadcast::Sender<SubmissionResult>,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let height = job.block.height;
        let result = tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::warn!(
                    target_key = %pipeline.key(),
                    height,
                    "Shutdown during publication, job abandoned"
                );
                break;
            }
            result = pipeline.publish(job) => result,
        };

        // No subscribers is fine
        let _ = results.send(result);
    }

    tracing::debug!(target_key = %pipeline.key(), "Publish worker stopped");
}
