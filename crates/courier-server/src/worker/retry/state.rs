//! Lifecycle of a retry chain.

use std::time::Duration;

/// Why a chain stopped without a 2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    /// Every allowed attempt failed.
    Exhausted,
    /// The webhook was disabled between attempts.
    Deactivated,
    /// The webhook was deleted between attempts.
    WebhookRemoved,
    /// The webhook's endpoint or secret cannot be used.
    Misconfigured,
}

/// Where a chain currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// Queued, nothing sent yet.
    Pending,
    /// An attempt is in flight.
    Delivering { attempt: u32 },
    /// `attempt` failed; the next one follows after `next_delay`.
    Retrying { attempt: u32, next_delay: Duration },
    /// The receiver answered 2xx on attempt `attempts`.
    Delivered { status: u16, attempts: u32 },
    /// No further attempts will be made.
    PermanentlyFailed { reason: FailureReason, attempts: u32 },
}

impl DeliveryState {
    /// Returns whether the chain has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Delivered { .. } | Self::PermanentlyFailed { .. }
        )
    }

    /// Returns the number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Delivering { attempt } => attempt.saturating_sub(1),
            Self::Retrying { attempt, .. } => *attempt,
            Self::Delivered { attempts, .. } | Self::PermanentlyFailed { attempts, .. } => {
                *attempts
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!DeliveryState::Pending.is_terminal());
        assert!(!DeliveryState::Delivering { attempt: 1 }.is_terminal());
        assert!(
            DeliveryState::PermanentlyFailed {
                reason: FailureReason::Exhausted,
                attempts: 5
            }
            .is_terminal()
        );
        assert_eq!(
            DeliveryState::Delivered {
                status: 200,
                attempts: 3
            }
            .attempts(),
            3
        );
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::WebhookRemoved.to_string(), "webhook_removed");
    }
}
