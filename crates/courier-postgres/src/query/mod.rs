//! Database query repositories.
//!
//! Repositories are extension traits implemented on [`PgConnection`], so any
//! pooled connection obtained from [`PgClient::get_connection`] can call them
//! directly.
//!
//! [`PgConnection`]: crate::PgConnection
//! [`PgClient::get_connection`]: crate::PgClient::get_connection

mod webhook;
mod webhook_delivery;

pub use webhook::WebhookRepository;
pub use webhook_delivery::WebhookDeliveryRepository;
