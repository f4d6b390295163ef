//! CORS for browser clients that trigger deliveries directly.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{Error, Result};

/// Request headers a browser client may send.
fn allowed_headers() -> [HeaderName; 4] {
    [
        header::AUTHORIZATION,
        HeaderName::from_static("x-client-info"),
        HeaderName::from_static("apikey"),
        header::CONTENT_TYPE,
    ]
}

/// Cross-origin settings for the HTTP routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// Origins allowed to call the routes; any origin when empty or `*`
    #[cfg_attr(
        feature = "config",
        arg(long = "cors-origins", env = "CORS_ORIGINS", value_delimiter = ',')
    )]
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Seconds a browser may cache a preflight answer
    #[cfg_attr(
        feature = "config",
        arg(long = "cors-max-age", env = "CORS_MAX_AGE", default_value_t = 3600)
    )]
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

const fn default_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: default_max_age(),
        }
    }
}

impl CorsConfig {
    /// Restricts the routes to `origins`.
    pub fn with_origins<I, O>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Rejects origins that are not valid header values.
    pub fn validate(&self) -> Result<()> {
        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(Error::config(format!("invalid CORS origin: {origin:?}")));
        }

        Ok(())
    }

    /// Builds the layer. Invalid origins are skipped; see [`Self::validate`].
    pub fn layer(&self) -> CorsLayer {
        let any = self.allowed_origins.is_empty()
            || self.allowed_origins.iter().any(|origin| origin == "*");

        let origins = if any {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                self.allowed_origins
                    .iter()
                    .filter_map(|origin| HeaderValue::from_str(origin).ok()),
            )
        };

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(allowed_headers())
            .max_age(self.max_age())
    }
}

/// Extension trait for `axum::`[`Router`] to answer CORS preflights.
pub trait RouterCorsExt<S> {
    /// Answers `OPTIONS` preflights and adds `Access-Control-Allow-*` headers.
    fn with_cors(self, config: &CorsConfig) -> Self;
}

impl<S> RouterCorsExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_cors(self, config: &CorsConfig) -> Self {
        self.layer(config.layer())
    }
}
