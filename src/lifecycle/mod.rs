//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → connect destinations → load cursors → Orchestrator
//!
//! Shutdown (shutdown.rs):
//!     Trigger → watch loops stop → workers abandon in-flight jobs → cursors flushed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Configuration and storage errors are fatal
//! - Destinations are reached before any source is watched; one that stays
//!   unreachable disables only its own targets

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::{build_orchestrator, StartupError};
