//! Result of one delivery attempt.

use courier_webhook::WebhookResponse;
use serde::{Deserialize, Serialize};

/// What happened to a single attempt.
///
/// Not-found webhooks and configuration defects are not outcomes; the
/// dispatcher reports them as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The webhook is disabled; nothing was sent.
    Inactive,
    /// The receiver answered 2xx.
    Delivered { status: u16 },
    /// The receiver answered with any other status.
    ReceiverError { status: u16, body: Option<String> },
    /// No response arrived.
    TransportError { message: String },
}

impl DeliveryOutcome {
    /// Classifies a provider response.
    pub fn from_response(response: &WebhookResponse) -> Self {
        match response.status_code {
            Some(status) if (200..300).contains(&status) => Self::Delivered { status },
            Some(status) => Self::ReceiverError {
                status,
                body: response.body.clone(),
            },
            None => Self::TransportError {
                message: response
                    .error
                    .clone()
                    .unwrap_or_else(|| "Webhook delivery failed".to_owned()),
            },
        }
    }

    /// Returns whether the receiver answered at all, whatever the status.
    pub fn success(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::ReceiverError { .. })
    }

    /// Returns whether a later attempt may change the result.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReceiverError { .. } | Self::TransportError { .. })
    }

    /// Returns the received HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Delivered { status } | Self::ReceiverError { status, .. } => Some(*status),
            Self::Inactive | Self::TransportError { .. } => None,
        }
    }
}
