//! Publisher Orchestrator: owns the watch loops and publish workers.
//!
//! # Task Layout
//! ```text
//! per source:  ChainWatcher ──► IntervalCounter (one per target, inline)
//!                                   │ PublishJob
//!                                   ▼
//! per target:                 mpsc queue ──► run_worker (Build + Submit, serial)
//! ```
//!
//! # Delivery
//! A target's cursor resets the moment a job is emitted, whatever happens to the
//! job afterwards. Each interval cycle is therefore published at most once: a job
//! that fails permanently, or is abandoned at shutdown, is not emitted again.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;

use crate::blockchain::client::{DestinationChain, SourceChain};
use crate::blockchain::types::BlockchainId;
use crate::config::schema::RelayerConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::publisher::builder::TransactionBuilder;
use crate::publisher::cursor_store::CursorStore;
use crate::publisher::interval::{IntervalCounter, PublishCursor};
use crate::publisher::pipeline::{run_worker, AccountLocks, PublishPipeline};
use crate::publisher::submitter::{Submitter, SubmitterSettings};
use crate::publisher::types::{
    DestinationTarget, PublishJob, SourceEndpoint, SubmissionResult, TargetKey,
};
use crate::publisher::watcher::{ChainWatcher, ReconnectPolicy, SourceState, StopReason};
use crate::resilience::retries::RetryPolicy;

const RESULT_CHANNEL_CAPACITY: usize = 1024;

/// Tuning shared by every source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayerSettings {
    pub reconnect: ReconnectPolicy,
    pub retry: RetryPolicy,
    pub submitter: SubmitterSettings,
    pub gas_limit: u64,
}

impl From<&RelayerConfig> for RelayerSettings {
    fn from(config: &RelayerConfig) -> Self {
        let retry = RetryPolicy::from(&config.retries);
        Self {
            reconnect: ReconnectPolicy::from(&config.watcher),
            retry,
            submitter: SubmitterSettings {
                receipt_timeout_secs: config.submission.receipt_timeout_secs,
                receipt_poll_interval_ms: config.submission.receipt_poll_interval_ms,
                broadcast_attempts: retry.max_attempts,
            },
            gas_limit: config.submission.gas_limit,
        }
    }
}

impl Default for RelayerSettings {
    fn default() -> Self {
        Self::from(&RelayerConfig::default())
    }
}

/// A target with the client of its destination chain.
pub struct DestinationPlan<D> {
    pub target: DestinationTarget,
    pub client: Arc<D>,
}

/// A source chain with its client and targets.
pub struct SourcePlan<S, D> {
    pub endpoint: SourceEndpoint,
    pub client: Arc<S>,
    pub destinations: Vec<DestinationPlan<D>>,
}

pub struct Orchestrator<S, D> {
    sources: Vec<SourcePlan<S, D>>,
    store: CursorStore,
    settings: RelayerSettings,
    shutdown: Shutdown,
    results: broadcast::Sender<SubmissionResult>,
}

impl<S: SourceChain, D: DestinationChain> Orchestrator<S, D> {
    pub fn new(
        sources: Vec<SourcePlan<S, D>>,
        store: CursorStore,
        settings: RelayerSettings,
    ) -> Self {
        let (results, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        Self {
            sources,
            store,
            settings,
            shutdown: Shutdown::new(),
            results,
        }
    }

    /// Terminal results of every job, across all targets.
    pub fn subscribe_results(&self) -> broadcast::Receiver<SubmissionResult> {
        self.results.subscribe()
    }

    /// Spawn one watch task per source and one worker per target.
    pub fn start(self) -> RelayerHandle {
        let locks = AccountLocks::default();
        let mut tasks = JoinSet::new();
        let mut states = HashMap::new();

        for plan in self.sources {
            let chain = plan.endpoint.blockchain_id.clone();
            let (watcher, state) =
                ChainWatcher::new(chain.clone(), plan.client.clone(), self.settings.reconnect);
            states.insert(chain.clone(), state);

            let mut routes = Vec::with_capacity(plan.destinations.len());
            for destination in plan.destinations {
                let key = destination.target.key();
                let counter = IntervalCounter::new(
                    key.clone(),
                    destination.target.interval,
                    self.store.get(&key),
                );

                let builder = TransactionBuilder::new(
                    plan.client.clone(),
                    destination.client.clone(),
                    destination.target,
                    self.settings.gas_limit,
                );
                let submitter = Submitter::new(
                    plan.client.clone(),
                    destination.client,
                    self.settings.submitter,
                );
                let pipeline = PublishPipeline::new(
                    builder,
                    submitter,
                    self.settings.retry,
                    &locks,
                    self.store.clone(),
                );

                let (jobs, queue) = mpsc::unbounded_channel();
                tasks.spawn(run_worker(
                    pipeline,
                    queue,
                    self.shutdown.subscribe(),
                    self.results.clone(),
                ));
                routes.push(Route { counter, jobs });
            }

            tracing::info!(
                source = %chain,
                ws_url = %plan.endpoint.ws_url(),
                targets = routes.len(),
                "Starting source"
            );
            tasks.spawn(run_source(
                watcher,
                routes,
                self.store.clone(),
                self.shutdown.subscribe(),
            ));
        }

        RelayerHandle {
            shutdown: self.shutdown,
            states,
            tasks,
            store: self.store,
        }
    }
}

/// A target as seen from its source's watch loop.
struct Route {
    counter: IntervalCounter,
    jobs: mpsc::UnboundedSender<PublishJob>,
}

async fn run_source<S: SourceChain>(
    mut watcher: ChainWatcher<S>,
    mut routes: Vec<Route>,
    store: CursorStore,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.recv() => None,
            next = watcher.next_block() => Some(next),
        };

        let block = match next {
            None => {
                watcher.stop(StopReason::Shutdown);
                tracing::info!(source = %watcher.chain(), "Source stopped");
                break;
            }
            Some(Err(e)) => {
                tracing::error!(source = %watcher.chain(), error = %e, "Source watcher failed");
                break;
            }
            Some(Ok(block)) => block,
        };

        tracing::debug!(
            source = %watcher.chain(),
            height = block.height,
            block_hash = %block.hash,
            "Observed block"
        );

        for route in &mut routes {
            if let Some(job) = route.counter.observe(&block) {
                let target = route.counter.target();
                metrics::record_publish_job(target.destination.as_str());
                tracing::info!(
                    target_key = %target,
                    height = job.block.height,
                    block_hash = %job.block.hash,
                    "Publish job emitted"
                );
                if route.jobs.send(job).is_err() {
                    tracing::warn!(target_key = %target, "Publish worker gone, job dropped");
                }
            }
            store.record_observation(route.counter.target(), route.counter.cursor());
        }

        if let Err(e) = store.persist().await {
            tracing::warn!(source = %watcher.chain(), error = %e, "Failed to persist publish cursors");
        }
    }
}

/// Control over a started relayer.
pub struct RelayerHandle {
    shutdown: Shutdown,
    states: HashMap<BlockchainId, watch::Receiver<SourceState>>,
    tasks: JoinSet<()>,
    store: CursorStore,
}

impl RelayerHandle {
    pub fn source_state(&self, chain: &BlockchainId) -> Option<SourceState> {
        self.states.get(chain).map(|state| state.borrow().clone())
    }

    /// Change notifications for one source.
    pub fn state_receiver(&self, chain: &BlockchainId) -> Option<watch::Receiver<SourceState>> {
        self.states.get(chain).cloned()
    }

    pub fn cursor(&self, target: &TargetKey) -> PublishCursor {
        self.store.get(target)
    }

    /// Signal every task to stop without waiting.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait until every task has finished. Safe to cancel and call again.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Relayer task failed");
            }
        }
    }

    /// Signal shutdown, join every task and flush cursors.
    pub async fn stop(mut self) {
        self.shutdown();
        self.wait().await;
        if let Err(e) = self.store.persist().await {
            tracing::warn!(error = %e, "Failed to persist publish cursors");
        }
        tracing::info!("Relayer stopped");
    }
}
