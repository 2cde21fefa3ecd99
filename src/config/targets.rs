//! Resolution of a validated configuration into pipeline values.

use alloy::primitives::Address;
use std::num::NonZeroU64;

use crate::blockchain::wallet::Wallet;
use crate::config::schema::{
    DestinationSubnetConfig, MessageContractConfig, RelayerConfig, SourceSubnetConfig,
};
use crate::config::validation::ValidationError;
use crate::publisher::types::{ChainEndpoint, DestinationTarget, SourceEndpoint};

/// A source chain with every destination registered against it.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub endpoint: SourceEndpoint,
    pub targets: Vec<DestinationTarget>,
}

impl From<&SourceSubnetConfig> for ChainEndpoint {
    fn from(config: &SourceSubnetConfig) -> Self {
        Self {
            subnet_id: config.subnet_id.clone(),
            blockchain_id: config.blockchain_id.as_str().into(),
            host: config.api_node_host.clone(),
            port: config.api_node_port,
            encrypt_connection: config.encrypt_connection,
        }
    }
}

impl From<&DestinationSubnetConfig> for ChainEndpoint {
    fn from(config: &DestinationSubnetConfig) -> Self {
        Self {
            subnet_id: config.subnet_id.clone(),
            blockchain_id: config.blockchain_id.as_str().into(),
            host: config.api_node_host.clone(),
            port: config.api_node_port,
            encrypt_connection: config.encrypt_connection,
        }
    }
}

/// Build sources and targets.
///
/// Wallets are bound to chain ID 0 here; startup rebinds them once the
/// destination's EVM chain ID is known.
pub fn resolve_sources(config: &RelayerConfig) -> Result<Vec<ResolvedSource>, ValidationError> {
    let mut sources = Vec::with_capacity(config.source_subnets.len());

    for source in &config.source_subnets {
        let endpoint = ChainEndpoint::from(source);
        let mut targets = Vec::new();

        for contract in &source.message_contracts {
            let MessageContractConfig::BlockHashPublisher { settings, .. } = contract;

            for descriptor in &settings.destination_chains {
                let dest = config
                    .destination_subnets
                    .iter()
                    .find(|d| d.blockchain_id == descriptor.blockchain_id)
                    .ok_or_else(|| ValidationError {
                        field: "destination_chains.blockchain_id".into(),
                        message: format!("no destination subnet '{}'", descriptor.blockchain_id),
                    })?;

                let receiver: Address = descriptor.address.parse().map_err(|_| ValidationError {
                    field: "destination_chains.address".into(),
                    message: format!("'{}' is not an address", descriptor.address),
                })?;
                let interval = NonZeroU64::new(descriptor.interval).ok_or_else(|| ValidationError {
                    field: "destination_chains.interval".into(),
                    message: "must be a positive number of blocks".into(),
                })?;
                let wallet = Wallet::from_private_key(&dest.account_private_key, 0).map_err(|e| {
                    ValidationError {
                        field: "destination_subnets.account_private_key".into(),
                        message: e.to_string(),
                    }
                })?;

                targets.push(DestinationTarget {
                    source: endpoint.blockchain_id.clone(),
                    destination: ChainEndpoint::from(dest),
                    receiver,
                    interval,
                    wallet,
                });
            }
        }

        sources.push(ResolvedSource { endpoint, targets });
    }

    Ok(sources)
}
