//! Webhook event type enumeration for webhook event subscriptions.

use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Domain events a webhook can subscribe to.
///
/// This enumeration corresponds to the `WEBHOOK_EVENT` PostgreSQL enum. The
/// string form (`ticket.created`, ...) is the value sent to receivers in the
/// envelope and the `X-Webhook-Event` header.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString, IntoStaticStr)]
#[ExistingTypePath = "crate::schema::sql_types::WebhookEvent"]
pub enum WebhookEvent {
    // Ticket events
    /// A new ticket was opened
    #[db_rename = "ticket.created"]
    #[serde(rename = "ticket.created")]
    #[strum(serialize = "ticket.created")]
    TicketCreated,

    /// A ticket was updated
    #[db_rename = "ticket.updated"]
    #[serde(rename = "ticket.updated")]
    #[strum(serialize = "ticket.updated")]
    TicketUpdated,

    /// A ticket was deleted
    #[db_rename = "ticket.deleted"]
    #[serde(rename = "ticket.deleted")]
    #[strum(serialize = "ticket.deleted")]
    TicketDeleted,

    /// A message was posted on a ticket
    #[db_rename = "ticket_message.created"]
    #[serde(rename = "ticket_message.created")]
    #[strum(serialize = "ticket_message.created")]
    TicketMessageCreated,

    // Team events
    /// A team was created
    #[db_rename = "team.created"]
    #[serde(rename = "team.created")]
    #[strum(serialize = "team.created")]
    TeamCreated,

    /// A team was updated
    #[db_rename = "team.updated"]
    #[serde(rename = "team.updated")]
    #[strum(serialize = "team.updated")]
    TeamUpdated,

    /// A member joined a team
    #[db_rename = "team_member.added"]
    #[serde(rename = "team_member.added")]
    #[strum(serialize = "team_member.added")]
    TeamMemberAdded,

    /// A member left a team
    #[db_rename = "team_member.removed"]
    #[serde(rename = "team_member.removed")]
    #[strum(serialize = "team_member.removed")]
    TeamMemberRemoved,
}

impl WebhookEvent {
    /// Returns the wire name of the event.
    #[inline]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Returns whether this is a ticket-related event.
    #[inline]
    pub fn is_ticket_event(self) -> bool {
        matches!(
            self,
            WebhookEvent::TicketCreated
                | WebhookEvent::TicketUpdated
                | WebhookEvent::TicketDeleted
                | WebhookEvent::TicketMessageCreated
        )
    }

    /// Returns whether this is a team-related event.
    #[inline]
    pub fn is_team_event(self) -> bool {
        !self.is_ticket_event()
    }

    /// Returns the event category, the part before the dot.
    pub fn category(self) -> &'static str {
        match self {
            WebhookEvent::TicketCreated
            | WebhookEvent::TicketUpdated
            | WebhookEvent::TicketDeleted => "ticket",
            WebhookEvent::TicketMessageCreated => "ticket_message",
            WebhookEvent::TeamCreated | WebhookEvent::TeamUpdated => "team",
            WebhookEvent::TeamMemberAdded | WebhookEvent::TeamMemberRemoved => "team_member",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for event in WebhookEvent::iter() {
            assert_eq!(WebhookEvent::from_str(event.as_str()).unwrap(), event);
            assert_eq!(event.to_string(), event.as_str());
            assert!(event.as_str().starts_with(event.category()));
        }
    }

    #[test]
    fn test_parse_rejects_unknown_event() {
        assert!(WebhookEvent::from_str("ticket.archived").is_err());
        assert!(WebhookEvent::from_str("TicketCreated").is_err());
        assert!(WebhookEvent::from_str("").is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&WebhookEvent::TeamMemberAdded).unwrap();
        assert_eq!(json, "\"team_member.added\"");

        let event: WebhookEvent = serde_json::from_str("\"ticket_message.created\"").unwrap();
        assert_eq!(event, WebhookEvent::TicketMessageCreated);
    }

    #[test]
    fn test_categories() {
        assert!(WebhookEvent::TicketMessageCreated.is_ticket_event());
        assert!(WebhookEvent::TeamUpdated.is_team_event());
        assert_eq!(WebhookEvent::TeamMemberRemoved.category(), "team_member");
    }
}
