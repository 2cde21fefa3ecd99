//! Startup orchestration.
//!
//! # Responsibilities
//! - Re-check the configuration and resolve it into targets
//! - Load persisted publish cursors
//! - Connect every destination chain (learning its EVM chain ID), with retries
//! - Assemble the orchestrator over alloy-backed clients
//!
//! A destination still unreachable after its retries disables only the targets
//! publishing to it. Startup fails when nothing is left to publish.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::client::{DestinationRpcClient, SourceRpcClient};
use crate::blockchain::types::{BlockchainError, BlockchainId, BlockchainResult};
use crate::config::schema::RelayerConfig;
use crate::config::targets::{resolve_sources, ResolvedSource};
use crate::config::validation::{validate_config, ValidationError};
use crate::publisher::cursor_store::CursorStore;
use crate::publisher::orchestrator::{DestinationPlan, Orchestrator, RelayerSettings, SourcePlan};
use crate::publisher::types::{ChainEndpoint, SourceEndpoint};
use crate::resilience::retries::RetryPolicy;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("cannot open cursor storage: {0}")]
    Storage(#[from] std::io::Error),

    #[error("source {chain}: {cause}")]
    Source {
        chain: BlockchainId,
        #[source]
        cause: BlockchainError,
    },

    #[error("nothing to publish, unreachable destinations: {}", format_chains(.unreachable))]
    NoReachableDestination { unreachable: Vec<BlockchainId> },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_chains(chains: &[BlockchainId]) -> String {
    chains
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type RpcOrchestrator = Orchestrator<SourceRpcClient, DestinationRpcClient>;

/// Build an orchestrator talking to real nodes.
///
/// Sources are only contacted once the orchestrator starts.
pub async fn build_orchestrator(config: &RelayerConfig) -> Result<RpcOrchestrator, StartupError> {
    validate_config(config).map_err(StartupError::Invalid)?;
    let resolved = resolve_sources(config).map_err(|e| StartupError::Invalid(vec![e]))?;
    let timeout_secs = config.submission.rpc_timeout_secs;

    let store = CursorStore::open(&config.storage_location)?;

    let endpoints: Vec<ChainEndpoint> =
        config.destination_subnets.iter().map(ChainEndpoint::from).collect();
    let destinations = connect_destinations(
        endpoints.iter().cloned(),
        RetryPolicy::from(&config.retries),
        |endpoint| DestinationRpcClient::connect(endpoint, timeout_secs),
    )
    .await;

    let plans = assemble_plans(resolved, &destinations, |endpoint| {
        SourceRpcClient::new(endpoint.clone(), timeout_secs)
    })?;
    if plans.is_empty() {
        let unreachable = endpoints
            .into_iter()
            .map(|e| e.blockchain_id)
            .filter(|chain| !destinations.contains_key(chain))
            .collect();
        return Err(StartupError::NoReachableDestination { unreachable });
    }

    Ok(Orchestrator::new(plans, store, RelayerSettings::from(config)))
}

/// Connect each destination chain once, retrying failures with backoff.
///
/// Destinations still unreachable after `retry.max_attempts` are logged and left
/// out of the returned map.
pub async fn connect_destinations<D, F, Fut>(
    endpoints: impl IntoIterator<Item = ChainEndpoint>,
    retry: RetryPolicy,
    mut connect: F,
) -> HashMap<BlockchainId, Arc<D>>
where
    F: FnMut(ChainEndpoint) -> Fut,
    Fut: Future<Output = BlockchainResult<D>>,
{
    let mut connected = HashMap::new();

    for endpoint in endpoints {
        let chain = endpoint.blockchain_id.clone();
        if connected.contains_key(&chain) {
            continue;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match connect(endpoint.clone()).await {
                Ok(client) => {
                    connected.insert(chain, Arc::new(client));
                    break;
                }
                Err(e) if retry.allows_retry(attempt) => {
                    let delay = retry.delay(attempt);
                    tracing::warn!(
                        destination = %chain,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Destination unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        destination = %chain,
                        attempts = attempt,
                        error = %e,
                        "Destination unreachable, its targets are disabled"
                    );
                    break;
                }
            }
        }
    }

    connected
}

/// Pair every target with its destination's client.
///
/// Targets whose destination is missing from `destinations` are dropped, and so
/// are sources left without any target.
pub fn assemble_plans<S, D>(
    resolved: Vec<ResolvedSource>,
    destinations: &HashMap<BlockchainId, Arc<D>>,
    mut source_client: impl FnMut(&SourceEndpoint) -> BlockchainResult<S>,
) -> Result<Vec<SourcePlan<S, D>>, StartupError> {
    let mut plans = Vec::with_capacity(resolved.len());

    for source in resolved {
        let chain = source.endpoint.blockchain_id.clone();

        let mut plan_destinations = Vec::with_capacity(source.targets.len());
        for target in source.targets {
            match destinations.get(&target.destination.blockchain_id) {
                Some(client) => plan_destinations.push(DestinationPlan {
                    target,
                    client: client.clone(),
                }),
                None => tracing::warn!(
                    target_key = %target.key(),
                    "Target disabled, destination unreachable"
                ),
            }
        }
        if plan_destinations.is_empty() {
            tracing::warn!(source = %chain, "Source skipped, no reachable destination");
            continue;
        }

        let client = source_client(&source.endpoint).map_err(|cause| StartupError::Source {
            chain: chain.clone(),
            cause,
        })?;
        tracing::info!(
            source = %chain,
            targets = plan_destinations.len(),
            "Source configured"
        );
        plans.push(SourcePlan {
            endpoint: source.endpoint,
            client: Arc::new(client),
            destinations: plan_destinations,
        });
    }

    Ok(plans)
}
