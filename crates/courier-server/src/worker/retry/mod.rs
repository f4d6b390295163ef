//! Scheduled redelivery of failed attempts.
//!
//! A chain is the sequence of attempts of one [`LogicalDelivery`]. Chains are
//! queued on the [`RetryScheduler`] and driven by the [`RetryWorker`], one task
//! per chain. Attempts of one chain are strictly sequential: the next attempt
//! is only scheduled after the previous ledger write finished.
//!
//! [`LogicalDelivery`]: crate::service::delivery::LogicalDelivery

mod config;
mod scheduler;
mod state;

pub use self::config::RetryConfig;
pub use self::scheduler::{RetryScheduler, RetryWorker};
pub use self::state::{DeliveryState, FailureReason};

/// Tracing target for retry operations.
pub const TRACING_TARGET: &str = "courier_server::worker::retry";
