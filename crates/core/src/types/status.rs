//! Supplier order status and its transition rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a supplier (production) order.
///
/// ```text
/// draft ⇄ requested ⇄ produced → completed
/// ```
///
/// Forward moves go one step at a time. Backward moves are allowed from
/// `requested` and `produced` only. `completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupplierOrderStatus {
    /// Being assembled, not yet sent to the workshop.
    #[default]
    Draft,
    /// Sent to the workshop.
    Requested,
    /// Produced by the workshop, awaiting reception.
    Produced,
    /// Received; stock committed. Terminal.
    Completed,
}

/// A status change that the order lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move supplier order from {from} to {to}")]
pub struct InvalidTransition {
    pub from: SupplierOrderStatus,
    pub to: SupplierOrderStatus,
}

impl SupplierOrderStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Requested => "requested",
            Self::Produced => "produced",
            Self::Completed => "completed",
        }
    }

    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether `self -> next` is a legal move. Staying put is always legal
    /// so that idempotent updates do not fail.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Draft | Self::Requested)
                | (Self::Requested, Self::Draft | Self::Requested | Self::Produced)
                | (Self::Produced, Self::Requested | Self::Produced | Self::Completed)
                | (Self::Completed, Self::Completed)
        )
    }

    /// Validate and return the next status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the move skips a step, goes backward
    /// from `draft`, or leaves `completed`.
    pub const fn transition_to(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }
}

impl std::fmt::Display for SupplierOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SupplierOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "requested" => Ok(Self::Requested),
            "produced" => Ok(Self::Produced),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid supplier order status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::SupplierOrderStatus::{Completed, Draft, Produced, Requested};
    use super::*;

    #[test]
    fn test_forward_steps_allowed() {
        assert!(Draft.can_transition_to(Requested));
        assert!(Requested.can_transition_to(Produced));
        assert!(Produced.can_transition_to(Completed));
    }

    #[test]
    fn test_skipping_forward_rejected() {
        assert!(!Draft.can_transition_to(Produced));
        assert!(!Draft.can_transition_to(Completed));
        assert!(!Requested.can_transition_to(Completed));
    }

    #[test]
    fn test_backward_steps() {
        assert!(Requested.can_transition_to(Draft));
        assert!(Produced.can_transition_to(Requested));
        assert!(!Produced.can_transition_to(Draft));
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(Completed.is_terminal());
        for next in [Draft, Requested, Produced] {
            let err = Completed.transition_to(next).unwrap_err();
            assert_eq!(err.from, Completed);
            assert_eq!(err.to, next);
        }
        assert_eq!(Completed.transition_to(Completed), Ok(Completed));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [Draft, Requested, Produced, Completed] {
            assert_eq!(status.as_str().parse::<SupplierOrderStatus>(), Ok(status));
        }
        assert!("in_progress".parse::<SupplierOrderStatus>().is_err());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = Draft.transition_to(Completed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot move supplier order from draft to completed"
        );
    }
}
