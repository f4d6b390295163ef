//! Database models for webhook registrations and delivery attempts.
//!
//! Each table has a `Queryable` model for reads and an `Insertable` model for
//! writes; webhooks additionally have an `AsChangeset` model for updates.

mod webhook;
mod webhook_delivery;

pub use webhook::{NewWebhook, UpdateWebhook, Webhook};
pub use webhook_delivery::{NewWebhookDelivery, WebhookDelivery};
