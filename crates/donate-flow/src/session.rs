//! Flow Session & States

use donate_core::Donation;

/// States of the payment flow state machine
///
/// ```text
/// Loading ──▶ ContentVisible ──▶ Polling ──▶ Succeeded
///    │              │               │
///    │              └──▶────────────┴──▶ PaymentFailed (retryable)
///    └──▶ ConnectionFailed
///
/// Cancelled is reachable from every non-terminal state via dismissal.
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    /// Page load in progress
    Loading,

    /// Donation page is showing; user interaction drives amount extraction
    ContentVisible,

    /// Completion checkpoint reached; polling the page for a status token
    Polling,

    /// Page load or routing failed; manual retry only
    ConnectionFailed,

    /// The payment did not go through; a retry affordance is surfaced
    PaymentFailed,

    /// Receipt committed and completion callback fired
    Succeeded,

    /// User dismissed the flow before a terminal outcome
    Cancelled,
}

impl FlowState {
    /// Terminal states absorb all further page events
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::PaymentFailed | Self::Succeeded | Self::Cancelled
        )
    }
}

/// Terminal outcome of one donation attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Payment confirmed; the receipt is already committed to the ledger
    Succeeded(Donation),

    /// Payment did not go through; the flow may be retried
    PaymentFailed,

    /// The page or the gateway routing could not be reached
    ConnectionFailed,

    /// User dismissed the flow
    Cancelled,
}

impl FlowOutcome {
    /// Whether a retry affordance should be shown for this outcome
    pub fn retryable(&self) -> bool {
        matches!(self, Self::PaymentFailed)
    }

    /// Generic title/body to surface to the end user. Raw error details never
    /// reach this layer - every failure maps to one of two generic states.
    pub fn user_message(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::ConnectionFailed => Some((
                "Failed to load",
                "Please check your internet connection and try again later.",
            )),
            Self::PaymentFailed => Some((
                "Payment failed",
                "Please check your credentials and try again later.",
            )),
            Self::Succeeded(_) | Self::Cancelled => None,
        }
    }
}

/// Transient state of one donation attempt
///
/// Exclusively owned by the controller driving the attempt; reset whenever
/// the flow restarts.
#[derive(Clone, Debug, Default)]
pub struct FlowSession {
    /// URL of the last finished navigation
    pub current_url: Option<String>,

    /// Last amount text accepted from the page, unset until extraction
    /// succeeds. Kept as raw text; parsing happens at success time so an
    /// unparseable amount is still distinguishable from an absent one.
    pub amount_text: Option<String>,

    /// Click observer is injected at most once per attempt
    pub(crate) observer_installed: bool,

    /// Status polls issued so far in this attempt
    pub(crate) poll_attempts: u32,
}

impl FlowSession {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!FlowState::Loading.is_terminal());
        assert!(!FlowState::ContentVisible.is_terminal());
        assert!(!FlowState::Polling.is_terminal());
        assert!(FlowState::ConnectionFailed.is_terminal());
        assert!(FlowState::PaymentFailed.is_terminal());
        assert!(FlowState::Succeeded.is_terminal());
        assert!(FlowState::Cancelled.is_terminal());
    }

    #[test]
    fn test_only_payment_failure_offers_retry() {
        assert!(FlowOutcome::PaymentFailed.retryable());
        assert!(!FlowOutcome::ConnectionFailed.retryable());
        assert!(!FlowOutcome::Cancelled.retryable());
    }

    #[test]
    fn test_failures_map_to_generic_messages() {
        let (title, _) = FlowOutcome::ConnectionFailed.user_message().unwrap();
        assert_eq!(title, "Failed to load");

        let (title, _) = FlowOutcome::PaymentFailed.user_message().unwrap();
        assert_eq!(title, "Payment failed");

        assert!(FlowOutcome::Cancelled.user_message().is_none());
    }
}
