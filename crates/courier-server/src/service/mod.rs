//! Application state and dependency injection.

mod config;
pub mod delivery;
mod emitter;
pub mod store;

use std::sync::Arc;

use courier_postgres::PgClient;
use courier_webhook::WebhookService;

pub use crate::service::config::ServiceConfig;
pub use crate::service::delivery::{
    DeliveryOutcome, DeliveryRequest, Dispatcher, LogicalDelivery,
};
pub use crate::service::emitter::WebhookEmitter;
#[cfg(any(test, feature = "test-utils"))]
pub use crate::service::store::MemoryStore;
pub use crate::service::store::{DeliveryLedger, WebhookRegistry};
use crate::worker::{RetryConfig, RetryScheduler, RetryWorker};
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection). Constructing the
/// state also yields the [`RetryWorker`] that must be run for scheduled
/// deliveries to make progress.
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    // Storage:
    pub registry: Arc<dyn WebhookRegistry>,
    pub ledger: Arc<dyn DeliveryLedger>,

    // Delivery:
    pub dispatcher: Dispatcher,
    pub scheduler: RetryScheduler,
    pub emitter: WebhookEmitter,
}

impl ServiceState {
    /// Wires the delivery services on top of a registry and a ledger.
    pub fn new(
        registry: Arc<dyn WebhookRegistry>,
        ledger: Arc<dyn DeliveryLedger>,
        webhook: WebhookService,
        retry: RetryConfig,
    ) -> (Self, RetryWorker) {
        let dispatcher = Dispatcher::new(registry.clone(), ledger.clone(), webhook);
        let (scheduler, worker) = RetryScheduler::new(dispatcher.clone(), retry);
        let emitter = WebhookEmitter::new(registry.clone(), scheduler.clone());

        let state = Self {
            registry,
            ledger,
            dispatcher,
            scheduler,
            emitter,
        };

        (state, worker)
    }

    /// Connects to Postgres, runs migrations and wires the services.
    pub async fn from_config(
        config: &ServiceConfig,
        webhook: WebhookService,
    ) -> Result<(Self, RetryWorker)> {
        config.validate()?;
        let pg_client = config.connect_postgres().await?;
        Ok(Self::from_postgres(pg_client, webhook, config.retry.clone()))
    }

    /// Uses `pg_client` as both registry and ledger.
    pub fn from_postgres(
        pg_client: PgClient,
        webhook: WebhookService,
        retry: RetryConfig,
    ) -> (Self, RetryWorker) {
        let store = Arc::new(pg_client);
        Self::new(store.clone(), store, webhook, retry)
    }

    /// Uses an in-memory store as both registry and ledger.
    #[cfg(any(test, feature = "test-utils"))]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
    pub fn in_memory(
        store: MemoryStore,
        webhook: WebhookService,
        retry: RetryConfig,
    ) -> (Self, RetryWorker) {
        let store = Arc::new(store);
        Self::new(store.clone(), store, webhook, retry)
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// Storage:
impl_di!(registry: Arc<dyn WebhookRegistry>);
impl_di!(ledger: Arc<dyn DeliveryLedger>);

// Delivery:
impl_di!(dispatcher: Dispatcher);
impl_di!(scheduler: RetryScheduler);
impl_di!(emitter: WebhookEmitter);
