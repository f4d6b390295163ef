//! Background workers.
//!
//! Workers run until their [`CancellationToken`] is cancelled and log their own
//! lifecycle.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod retry;

pub use self::retry::{
    DeliveryState, FailureReason, RetryConfig, RetryScheduler, RetryWorker,
};
