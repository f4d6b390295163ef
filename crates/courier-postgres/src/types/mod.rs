//! Database enumerations shared between the schema and the models.

mod webhook_event;

pub use webhook_event::WebhookEvent;
