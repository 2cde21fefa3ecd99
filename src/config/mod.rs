//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayerConfig (validated, immutable)
//!     → targets.rs (SourceEndpoint / DestinationTarget values for the pipeline)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; components receive plain values, never the config
//! - All tuning fields have defaults to allow minimal configs
//! - Message protocols are a tagged enum, one variant per format

pub mod loader;
pub mod schema;
pub mod targets;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BlockHashPublisherSettings, DestinationDescriptor, DestinationSubnetConfig,
    MessageContractConfig, RelayerConfig, RetryConfig, SourceSubnetConfig, SubmissionConfig,
    WatcherConfig,
};
pub use targets::{resolve_sources, ResolvedSource};
