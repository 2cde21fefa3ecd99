//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (destination descriptors reference configured subnets)
//! - Validate value ranges (intervals > 0, ports valid, timeouts > 0)
//! - Detect duplicate chains and targets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::collections::HashSet;
use std::fmt;

use crate::blockchain::wallet::Wallet;
use crate::config::schema::{MessageContractConfig, RelayerConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &RelayerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.storage_location.as_os_str().is_empty() {
        errors.push(ValidationError::new("storage_location", "must not be empty"));
    }
    if config.submission.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("submission.rpc_timeout_secs", "must be positive"));
    }
    if config.submission.receipt_timeout_secs == 0 {
        errors.push(ValidationError::new("submission.receipt_timeout_secs", "must be positive"));
    }
    if config.submission.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "submission.receipt_poll_interval_ms",
            "must be positive",
        ));
    }
    if config.submission.gas_limit < 21_000 {
        errors.push(ValidationError::new(
            "submission.gas_limit",
            "must cover the intrinsic cost of 21000",
        ));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.metrics.enabled && config.metrics.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "metrics.bind_address",
            format!("'{}' is not a socket address", config.metrics.bind_address),
        ));
    }

    if config.source_subnets.is_empty() {
        errors.push(ValidationError::new("source_subnets", "at least one source is required"));
    }

    let mut destination_ids = HashSet::new();
    for (i, dest) in config.destination_subnets.iter().enumerate() {
        let field = format!("destination_subnets[{}]", i);
        if let Some(problem) = blockchain_id_problem(&dest.blockchain_id) {
            errors.push(ValidationError::new(format!("{}.blockchain_id", field), problem));
        } else if !destination_ids.insert(dest.blockchain_id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.blockchain_id", field),
                format!("duplicate destination '{}'", dest.blockchain_id),
            ));
        }
        if dest.api_node_host.is_empty() {
            errors.push(ValidationError::new(format!("{}.api_node_host", field), "must not be empty"));
        }
        if dest.api_node_port == 0 {
            errors.push(ValidationError::new(format!("{}.api_node_port", field), "must not be 0"));
        }
        if let Err(e) = Wallet::address_of(&dest.account_private_key) {
            errors.push(ValidationError::new(format!("{}.account_private_key", field), e.to_string()));
        }
    }

    let mut source_ids = HashSet::new();
    for (i, source) in config.source_subnets.iter().enumerate() {
        let field = format!("source_subnets[{}]", i);
        if let Some(problem) = blockchain_id_problem(&source.blockchain_id) {
            errors.push(ValidationError::new(format!("{}.blockchain_id", field), problem));
        } else if !source_ids.insert(source.blockchain_id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.blockchain_id", field),
                format!("duplicate source '{}'", source.blockchain_id),
            ));
        }
        if source.api_node_host.is_empty() {
            errors.push(ValidationError::new(format!("{}.api_node_host", field), "must not be empty"));
        }
        if source.api_node_port == 0 {
            errors.push(ValidationError::new(format!("{}.api_node_port", field), "must not be 0"));
        }

        let mut targets = HashSet::new();
        for (j, contract) in source.message_contracts.iter().enumerate() {
            let MessageContractConfig::BlockHashPublisher { address, settings } = contract;
            let contract_field = format!("{}.message_contracts[{}]", field, j);

            if address.parse::<Address>().is_err() {
                errors.push(ValidationError::new(
                    format!("{}.address", contract_field),
                    format!("'{}' is not an address", address),
                ));
            }

            for (k, descriptor) in settings.destination_chains.iter().enumerate() {
                let dest_field = format!("{}.settings.destination_chains[{}]", contract_field, k);

                if descriptor.interval == 0 {
                    errors.push(ValidationError::new(
                        format!("{}.interval", dest_field),
                        "must be a positive number of blocks",
                    ));
                }
                if !config
                    .destination_subnets
                    .iter()
                    .any(|d| d.blockchain_id == descriptor.blockchain_id)
                {
                    errors.push(ValidationError::new(
                        format!("{}.blockchain_id", dest_field),
                        format!("no destination subnet '{}' configured", descriptor.blockchain_id),
                    ));
                }
                match descriptor.address.parse::<Address>() {
                    Ok(receiver) => {
                        if !targets.insert((descriptor.blockchain_id.as_str(), receiver)) {
                            errors.push(ValidationError::new(
                                format!("{}.address", dest_field),
                                format!(
                                    "receiver {} on '{}' listed twice for this source",
                                    receiver, descriptor.blockchain_id
                                ),
                            ));
                        }
                    }
                    Err(_) => errors.push(ValidationError::new(
                        format!("{}.address", dest_field),
                        format!("'{}' is not an address", descriptor.address),
                    )),
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Blockchain IDs are path segments of the API URLs and of persisted cursor keys.
fn blockchain_id_problem(id: &str) -> Option<String> {
    if id.is_empty() {
        Some("must not be empty".into())
    } else if id.contains('/') {
        Some(format!("'{}' must not contain '/'", id))
    } else {
        None
    }
}
