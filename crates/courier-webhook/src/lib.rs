#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod envelope;
mod error;
mod service;

pub mod request;
pub mod response;
pub mod signature;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

pub use envelope::{WebhookEnvelope, format_timestamp, truncate_to_millis};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use request::WebhookRequest;
pub use response::WebhookResponse;
pub use service::WebhookService;
pub use signature::Signature;

/// Tracing target for webhook operations.
pub const TRACING_TARGET: &str = "courier_webhook";

/// Core trait for webhook delivery operations.
///
/// Implementations perform exactly one HTTP call per invocation. A request that
/// reaches the network but gets no response (connect failure, timeout) is
/// reported as `Ok` with [`WebhookResponse::error`] set, so callers can still
/// account for the attempt; `Err` is reserved for failures before anything was sent.
#[async_trait::async_trait]
pub trait WebhookProvider: Send + Sync {
    /// Delivers a signed webhook request to its endpoint.
    async fn deliver(&self, request: &WebhookRequest) -> Result<WebhookResponse>;
}
