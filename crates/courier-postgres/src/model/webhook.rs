//! Webhook model for PostgreSQL database operations.
//!
//! A webhook is a registered HTTP endpoint with a signing secret and a set of
//! subscribed event types. Delivery only ever reads these rows.

use std::fmt;

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use url::Url;
use uuid::Uuid;

use crate::schema::webhooks;
use crate::types::WebhookEvent;
use crate::{PgError, PgResult};

/// Webhook model representing a registered delivery endpoint.
#[derive(Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Webhook {
    /// Unique webhook identifier.
    pub id: Uuid,
    /// Human-readable name for the webhook.
    pub name: String,
    /// Webhook endpoint URL.
    pub url: String,
    /// Array of event types this webhook subscribes to.
    pub events: Vec<Option<WebhookEvent>>,
    /// Whether the webhook currently receives deliveries.
    pub is_active: bool,
    /// HMAC-SHA256 signing secret shared with the receiver.
    pub secret: String,
    /// Profile that registered this webhook.
    pub created_by: Option<Uuid>,
    /// Timestamp when this webhook was created.
    pub created_at: Timestamp,
    /// Timestamp when this webhook was last modified.
    pub updated_at: Timestamp,
}

/// Data structure for registering a new webhook.
#[derive(Clone, Default, Insertable)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewWebhook {
    /// Webhook identifier, generated by the database when `None`.
    pub id: Option<Uuid>,
    /// Human-readable name for the webhook.
    pub name: String,
    /// Webhook endpoint URL.
    pub url: String,
    /// Array of event types this webhook subscribes to.
    pub events: Vec<Option<WebhookEvent>>,
    /// Initial activation state, active when `None`.
    pub is_active: Option<bool>,
    /// HMAC-SHA256 signing secret.
    pub secret: String,
    /// Profile registering this webhook.
    pub created_by: Option<Uuid>,
}

/// Data structure for updating an existing webhook.
#[derive(Clone, Default, AsChangeset)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateWebhook {
    /// Updated name for the webhook.
    pub name: Option<String>,
    /// Updated endpoint URL.
    pub url: Option<String>,
    /// Updated event subscriptions.
    pub events: Option<Vec<Option<WebhookEvent>>>,
    /// Updated activation state.
    pub is_active: Option<bool>,
    /// Rotated signing secret.
    pub secret: Option<String>,
}

/// Parses `url` and requires an absolute `http` or `https` URL.
fn parse_endpoint(url: &str) -> PgResult<Url> {
    let parsed =
        Url::parse(url).map_err(|e| PgError::Config(format!("invalid webhook url: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(PgError::Config(format!(
            "webhook url must use http or https, got {scheme}"
        ))),
    }
}

impl Webhook {
    /// Returns the list of subscribed events.
    pub fn subscribed_events(&self) -> Vec<WebhookEvent> {
        self.events.iter().filter_map(|e| *e).collect()
    }

    /// Returns whether the webhook subscribes to a specific event type.
    pub fn subscribes_to(&self, event: WebhookEvent) -> bool {
        self.events.contains(&Some(event))
    }

    /// Returns whether the webhook should receive `event` right now.
    pub fn accepts(&self, event: WebhookEvent) -> bool {
        self.is_active && self.subscribes_to(event)
    }

    /// Parses the stored endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`PgError::Config`] if the stored value is not an absolute
    /// `http`/`https` URL.
    pub fn endpoint(&self) -> PgResult<Url> {
        parse_endpoint(&self.url)
    }

    /// Returns the signing secret as bytes.
    #[inline]
    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> jiff::Timestamp {
        self.created_at.into()
    }

    /// Returns the last modification time.
    pub fn updated_at(&self) -> jiff::Timestamp {
        self.updated_at.into()
    }
}

impl fmt::Debug for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webhook")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("events", &self.subscribed_events())
            .field("is_active", &self.is_active)
            .field("created_by", &self.created_by)
            .finish_non_exhaustive()
    }
}

impl NewWebhook {
    /// Creates a new active webhook registration.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        secret: impl Into<String>,
        events: impl IntoIterator<Item = WebhookEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            secret: secret.into(),
            events: events.into_iter().map(Some).collect(),
            ..Default::default()
        }
    }

    /// Sets an explicit identifier.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the initial activation state.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Sets the registering profile.
    pub fn with_created_by(mut self, created_by: Uuid) -> Self {
        self.created_by = Some(created_by);
        self
    }

    /// Validates the registration before it is written.
    ///
    /// The name and secret must be non-empty and the URL an absolute
    /// `http`/`https` URL.
    pub fn validate(&self) -> PgResult<()> {
        if self.name.trim().is_empty() {
            return Err(PgError::Config("webhook name cannot be empty".into()));
        }

        if self.secret.is_empty() {
            return Err(PgError::Config("webhook secret cannot be empty".into()));
        }

        parse_endpoint(&self.url)?;
        Ok(())
    }
}

impl fmt::Debug for NewWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewWebhook")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("events", &self.events)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl UpdateWebhook {
    /// Validates the fields that are being changed.
    pub fn validate(&self) -> PgResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PgError::Config("webhook name cannot be empty".into()));
        }

        if self.secret.as_deref().is_some_and(str::is_empty) {
            return Err(PgError::Config("webhook secret cannot be empty".into()));
        }

        if let Some(url) = &self.url {
            parse_endpoint(url)?;
        }

        Ok(())
    }
}

impl fmt::Debug for UpdateWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateWebhook")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("events", &self.events)
            .field("is_active", &self.is_active)
            .field("secret_rotated", &self.secret.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(is_active: bool) -> Webhook {
        let now = jiff_diesel::Timestamp::from(jiff::Timestamp::now());
        Webhook {
            id: Uuid::now_v7(),
            name: "crm".into(),
            url: "https://example.com/hooks".into(),
            events: vec![Some(WebhookEvent::TicketCreated), None],
            is_active,
            secret: "s3cret".into(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_accepts_requires_active_and_subscription() {
        assert!(webhook(true).accepts(WebhookEvent::TicketCreated));
        assert!(!webhook(true).accepts(WebhookEvent::TicketDeleted));
        assert!(!webhook(false).accepts(WebhookEvent::TicketCreated));
        assert_eq!(
            webhook(true).subscribed_events(),
            vec![WebhookEvent::TicketCreated]
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", webhook(true));
        assert!(!debug.contains("s3cret"));

        let new = NewWebhook::new("crm", "https://example.com", "s3cret", []);
        assert!(!format!("{new:?}").contains("s3cret"));
    }

    #[test]
    fn test_new_webhook_validation() {
        let valid = NewWebhook::new(
            "crm",
            "https://example.com/hooks",
            "secret",
            [WebhookEvent::TeamCreated],
        );
        assert!(valid.validate().is_ok());

        let empty_secret = NewWebhook::new("crm", "https://example.com", "", []);
        assert!(empty_secret.validate().is_err());

        let relative = NewWebhook::new("crm", "/hooks", "secret", []);
        assert!(relative.validate().is_err());

        let ftp = NewWebhook::new("crm", "ftp://example.com", "secret", []);
        assert!(ftp.validate().is_err());

        let blank_name = NewWebhook::new("  ", "https://example.com", "secret", []);
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn test_update_webhook_validation() {
        assert!(UpdateWebhook::default().validate().is_ok());

        let rotate_empty = UpdateWebhook {
            secret: Some(String::new()),
            ..Default::default()
        };
        assert!(rotate_empty.validate().is_err());

        let bad_url = UpdateWebhook {
            url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_endpoint_parses_stored_url() {
        let endpoint = webhook(true).endpoint().unwrap();
        assert_eq!(endpoint.host_str(), Some("example.com"));
    }
}
