//! Source chain watcher.
//!
//! Turns a source chain's new-heads subscriptions into one ordered, unbounded
//! sequence of [`BlockObservation`]s. A dropped subscription is re-opened with
//! backoff and resumes at the chain's current head; blocks produced while
//! disconnected are not replayed.

use futures_util::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::blockchain::client::{BlockStream, SourceChain};
use crate::blockchain::types::{BlockchainError, BlockchainId};
use crate::config::schema::WatcherConfig;
use crate::observability::metrics;
use crate::publisher::types::BlockObservation;
use crate::resilience::backoff::Backoff;

/// Lifecycle of one source, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Starting,
    Watching,
    Reconnecting { attempt: u32 },
    Stopped { reason: StopReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot subscribe to {chain}: {cause}")]
    Connect {
        chain: BlockchainId,
        cause: BlockchainError,
    },

    #[error("gave up on {chain} after {attempts} reconnect attempts: {last}")]
    ReconnectExhausted {
        chain: BlockchainId,
        attempts: u32,
        last: BlockchainError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl ReconnectPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay_ms, self.max_delay_ms)
    }
}

impl From<&WatcherConfig> for ReconnectPolicy {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            base_delay_ms: config.reconnect_base_delay_ms,
            max_delay_ms: config.reconnect_max_delay_ms,
        }
    }
}

pub struct ChainWatcher<S> {
    chain: BlockchainId,
    client: Arc<S>,
    policy: ReconnectPolicy,
    stream: Option<BlockStream>,
    connected_once: bool,
    last_height: Option<u64>,
    state: watch::Sender<SourceState>,
}

impl<S: SourceChain> ChainWatcher<S> {
    pub fn new(
        chain: BlockchainId,
        client: Arc<S>,
        policy: ReconnectPolicy,
    ) -> (Self, watch::Receiver<SourceState>) {
        let (state, state_rx) = watch::channel(SourceState::Starting);
        let watcher = Self {
            chain,
            client,
            policy,
            stream: None,
            connected_once: false,
            last_height: None,
            state,
        };
        (watcher, state_rx)
    }

    pub fn chain(&self) -> &BlockchainId {
        &self.chain
    }

    /// Next block in increasing height order.
    ///
    /// Only fails when the first subscription cannot be opened or when
    /// reconnecting has been given up; the watcher is then stopped.
    pub async fn next_block(&mut self) -> Result<BlockObservation, WatchError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                self.connect().await?;
                continue;
            };

            match stream.next().await {
                Some(block) => {
                    if self.last_height.is_some_and(|h| block.height <= h) {
                        tracing::debug!(
                            source = %self.chain,
                            height = block.height,
                            "Ignoring block at or below last delivered height"
                        );
                        continue;
                    }
                    self.last_height = Some(block.height);
                    metrics::record_block_observed(self.chain.as_str());
                    return Ok(block);
                }
                None => {
                    tracing::warn!(source = %self.chain, "Head subscription ended");
                    self.stream = None;
                }
            }
        }
    }

    /// Publish the final state.
    pub fn stop(&self, reason: StopReason) {
        self.state.send_replace(SourceState::Stopped { reason });
    }

    async fn connect(&mut self) -> Result<(), WatchError> {
        if !self.connected_once {
            return match self.client.subscribe_heads().await {
                Ok(stream) => {
                    self.install(stream);
                    tracing::info!(source = %self.chain, "Watching source chain");
                    Ok(())
                }
                Err(cause) => {
                    let err = WatchError::Connect {
                        chain: self.chain.clone(),
                        cause,
                    };
                    self.stop(StopReason::Fatal(err.to_string()));
                    Err(err)
                }
            };
        }

        let mut last = None;
        for attempt in 1..=self.policy.max_attempts {
            self.state.send_replace(SourceState::Reconnecting { attempt });
            metrics::record_watcher_reconnect(self.chain.as_str());
            self.policy.backoff().sleep(attempt).await;

            match self.client.subscribe_heads().await {
                Ok(stream) => {
                    self.install(stream);
                    tracing::info!(source = %self.chain, attempt, "Re-subscribed to source chain");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(source = %self.chain, attempt, error = %e, "Reconnect failed");
                    last = Some(e);
                }
            }
        }

        let err = WatchError::ReconnectExhausted {
            chain: self.chain.clone(),
            attempts: self.policy.max_attempts,
            last: last.unwrap_or_else(|| {
                BlockchainError::Subscription("reconnecting disabled".to_string())
            }),
        };
        self.stop(StopReason::Fatal(err.to_string()));
        Err(err)
    }

    fn install(&mut self, stream: BlockStream) {
        self.stream = Some(stream);
        self.connected_once = true;
        self.state.send_replace(SourceState::Watching);
    }
}
