//! Outbound delivery client settings.

use std::borrow::Cow;
use std::ops::RangeInclusive;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Whole-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connect timeout applied when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;

/// Settings of the HTTP client that POSTs signed envelopes to receivers.
///
/// Redirects are never followed: a `3xx` reply is recorded as the receiver's
/// answer to the signed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ReqwestConfig {
    /// Seconds a delivery attempt may take end to end (1-300)
    #[cfg_attr(
        feature = "config",
        arg(long = "http-timeout", env = "HTTP_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)
    )]
    #[serde(default = "default_timeout")]
    pub http_timeout: u64,

    /// Seconds allowed for the TCP and TLS handshake (1-300, at most the request timeout)
    #[cfg_attr(
        feature = "config",
        arg(
            long = "http-connect-timeout",
            env = "HTTP_CONNECT_TIMEOUT",
            default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS
        )
    )]
    #[serde(default = "default_connect_timeout")]
    pub http_connect_timeout: u64,

    /// User-Agent sent to receivers, `courier/<version>` when unset
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "HTTP_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

impl ReqwestConfig {
    /// Creates settings with a request timeout of `timeout_secs`.
    ///
    /// The connect timeout is the default, capped at `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            http_timeout: timeout_secs,
            http_connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS.min(timeout_secs),
            user_agent: None,
        }
    }

    /// Overrides the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.http_connect_timeout = secs;
        self
    }

    /// Overrides the User-Agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Per-attempt timeout, used when a request does not carry its own.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout)
    }

    pub fn effective_user_agent(&self) -> Cow<'_, str> {
        match &self.user_agent {
            Some(agent) => Cow::Borrowed(agent),
            None => Cow::Owned(format!("courier/{}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Checks timeout ranges and rejects a blank User-Agent.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("http_timeout", self.http_timeout),
            ("http_connect_timeout", self.http_connect_timeout),
        ] {
            if !TIMEOUT_RANGE.contains(&secs) {
                return Err(Error::Config(format!(
                    "{name} must be between {} and {} seconds",
                    TIMEOUT_RANGE.start(),
                    TIMEOUT_RANGE.end()
                )));
            }
        }

        if self.http_connect_timeout > self.http_timeout {
            return Err(Error::Config(
                "http_connect_timeout cannot exceed http_timeout".into(),
            ));
        }

        if self
            .user_agent
            .as_deref()
            .is_some_and(|agent| agent.trim().is_empty())
        {
            return Err(Error::Config("user_agent cannot be blank".into()));
        }

        Ok(())
    }
}
