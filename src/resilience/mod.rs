//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! RPC call to a chain:
//!     → timeouts.rs (every call has a deadline)
//!     → On failure: retries.rs (retryable? back off and re-run the whole cycle)
//!     → backoff.rs (exponential delay with jitter)
//! ```

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use retries::RetryPolicy;
pub use timeouts::with_timeout;
