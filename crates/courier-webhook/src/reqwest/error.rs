//! Error types for reqwest-based webhook delivery.

use thiserror::Error;

/// Result type alias for reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client could not be built or the request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Client configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns a short, stable description of a transport failure.
    ///
    /// Timeouts and connect failures collapse to fixed messages; everything else
    /// keeps the underlying error text.
    pub fn transport_message(&self) -> String {
        match self {
            Error::Reqwest(e) if e.is_timeout() => "Request timed out".to_string(),
            Error::Reqwest(e) if e.is_connect() => "Connection failed".to_string(),
            Error::Reqwest(e) => e.to_string(),
            Error::Config(msg) => msg.clone(),
        }
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) if e.is_timeout() => crate::Error::timeout()
                .with_message(e.to_string())
                .with_source(e),
            Error::Reqwest(e) if e.is_builder() => crate::Error::configuration()
                .with_message(e.to_string())
                .with_source(e),
            Error::Reqwest(e) => crate::Error::network_error()
                .with_message(e.to_string())
                .with_source(e),
            Error::Config(msg) => crate::Error::configuration().with_message(msg),
        }
    }
}
