//! Interval-gated block hash publishing.
//!
//! # Data Flow
//! ```text
//! source chain new heads
//!     → watcher.rs (ordered BlockObservations, reconnects)
//!     → interval.rs (one cursor per target, emits PublishJobs)
//!     → builder.rs (canonical check, nonce, fees, signed receiveBlockHash)
//!     → submitter.rs (broadcast, wait for inclusion)
//!     → destination chain
//! ```
//!
//! pipeline.rs wraps build + submit with retries per target; orchestrator.rs
//! wires sources, targets and shutdown together. cursor_store.rs keeps the
//! cursors across restarts.

pub mod builder;
pub mod cursor_store;
pub mod error;
pub mod interval;
pub mod orchestrator;
pub mod pipeline;
pub mod submitter;
pub mod types;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{SignedPublication, TransactionBuilder};
pub use cursor_store::CursorStore;
pub use error::{ErrorKind, PublishError};
pub use interval::{IntervalCounter, PublishCursor};
pub use orchestrator::{DestinationPlan, Orchestrator, RelayerHandle, RelayerSettings, SourcePlan};
pub use submitter::{Inclusion, Submitter};
pub use types::{
    BlockObservation, ChainEndpoint, DestinationTarget, PublishJob, PublishOutcome,
    SourceEndpoint, SubmissionResult, TargetKey,
};
pub use watcher::{ChainWatcher, SourceState, StopReason, WatchError};
