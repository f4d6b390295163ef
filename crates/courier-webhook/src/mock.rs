//! Scripted in-process webhook provider for testing.
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! courier-webhook = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_webhook::mock::{Scripted, ScriptedProvider};
//!
//! let provider = ScriptedProvider::new([Scripted::status(500), Scripted::status(200)]);
//! let service = provider.clone().into_service();
//! // ... deliver twice, then inspect provider.requests()
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use jiff::Timestamp;

use crate::{Result, WebhookProvider, WebhookRequest, WebhookResponse, WebhookService};

/// A scripted outcome for one delivery.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Respond with the given status and body.
    Status(u16, Option<String>),
    /// Fail without a response, as a connect error or timeout would.
    TransportError(String),
}

impl Scripted {
    /// Shorthand for a response with an empty body.
    pub fn status(status: u16) -> Self {
        Self::Status(status, None)
    }

    /// Shorthand for a transport failure.
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::TransportError(message.into())
    }
}

type DeliverHook = Arc<dyn Fn(&WebhookRequest) + Send + Sync>;

#[derive(Default)]
struct ScriptedProviderInner {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<WebhookRequest>>,
    on_deliver: Option<DeliverHook>,
}

/// Provider that replays a script of outcomes and records every request.
///
/// Once the script is exhausted every further delivery answers `200`.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    inner: Arc<ScriptedProviderInner>,
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("delivered", &self.delivered())
            .finish_non_exhaustive()
    }
}

impl ScriptedProvider {
    /// Creates a provider that replays `script` in order.
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            inner: Arc::new(ScriptedProviderInner {
                script: Mutex::new(script.into_iter().collect()),
                ..Default::default()
            }),
        }
    }

    /// Creates a provider that runs `hook` on every delivery, before answering.
    pub fn with_hook(
        script: impl IntoIterator<Item = Scripted>,
        hook: impl Fn(&WebhookRequest) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(ScriptedProviderInner {
                script: Mutex::new(script.into_iter().collect()),
                requests: Mutex::default(),
                on_deliver: Some(Arc::new(hook)),
            }),
        }
    }

    /// Returns every request delivered so far.
    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of deliveries so far.
    pub fn delivered(&self) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Converts this provider into a [`WebhookService`].
    pub fn into_service(self) -> WebhookService {
        WebhookService::new(self)
    }
}

#[async_trait::async_trait]
impl WebhookProvider for ScriptedProvider {
    async fn deliver(&self, request: &WebhookRequest) -> Result<WebhookResponse> {
        let started_at = Timestamp::now();

        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(hook) = &self.inner.on_deliver {
            hook(request);
        }

        let next = self
            .inner
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        let response = match next {
            Some(Scripted::Status(status, body)) => {
                WebhookResponse::received(request.request_id, status, body, started_at)
            }
            Some(Scripted::TransportError(message)) => {
                WebhookResponse::failed(request.request_id, message, started_at)
            }
            None => WebhookResponse::received(request.request_id, 200, None, started_at),
        };

        Ok(response)
    }
}
