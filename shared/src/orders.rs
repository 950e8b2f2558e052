//! Server-side order status of assigned visits.
//!
//! Order actions are REST calls gated by the access token. While one is in
//! flight the visit sits in a transitional status and remembers where it came
//! from, so a failed call or a failed token refresh can put it back.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Ongoing,
    Completing,
    Cancelling,
    Snoozing,
    Unsnoozing,
    Completed,
    Cancelled,
    Snoozed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Complete,
    Cancel,
    Snooze,
    Unsnooze,
}

impl OrderAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Snooze => "snooze",
            Self::Unsnooze => "unsnooze",
        }
    }

    /// Status shown while the call is outstanding.
    #[must_use]
    pub const fn in_progress(self) -> OrderStatus {
        match self {
            Self::Complete => OrderStatus::Completing,
            Self::Cancel => OrderStatus::Cancelling,
            Self::Snooze => OrderStatus::Snoozing,
            Self::Unsnooze => OrderStatus::Unsnoozing,
        }
    }

    /// Status once the server accepted the action.
    #[must_use]
    pub const fn completed(self) -> OrderStatus {
        match self {
            Self::Complete => OrderStatus::Completed,
            Self::Cancel => OrderStatus::Cancelled,
            Self::Snooze => OrderStatus::Snoozed,
            Self::Unsnooze => OrderStatus::Ongoing,
        }
    }
}

impl OrderStatus {
    #[must_use]
    pub const fn is_transitional(self) -> bool {
        matches!(
            self,
            Self::Completing | Self::Cancelling | Self::Snoozing | Self::Unsnoozing
        )
    }

    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether `action` may start from this status.
    #[must_use]
    pub const fn accepts(self, action: OrderAction) -> bool {
        match action {
            OrderAction::Complete | OrderAction::Cancel => {
                matches!(self, Self::Ongoing | Self::Snoozed)
            }
            OrderAction::Snooze => matches!(self, Self::Ongoing),
            OrderAction::Unsnooze => matches!(self, Self::Snoozed),
        }
    }
}

/// An order action waiting for, or riding on, the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrderAction {
    pub action: OrderAction,
    pub previous: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_sources() {
        assert!(OrderStatus::Ongoing.accepts(OrderAction::Complete));
        assert!(OrderStatus::Snoozed.accepts(OrderAction::Cancel));
        assert!(OrderStatus::Snoozed.accepts(OrderAction::Unsnooze));
        assert!(!OrderStatus::Ongoing.accepts(OrderAction::Unsnooze));
        assert!(!OrderStatus::Completed.accepts(OrderAction::Cancel));
        assert!(!OrderStatus::Completing.accepts(OrderAction::Complete));
    }

    #[test]
    fn action_statuses() {
        for action in [
            OrderAction::Complete,
            OrderAction::Cancel,
            OrderAction::Snooze,
            OrderAction::Unsnooze,
        ] {
            assert!(action.in_progress().is_transitional());
            assert!(!action.completed().is_transitional());
        }
        assert!(OrderAction::Complete.completed().is_final());
        assert_eq!(OrderAction::Unsnooze.completed(), OrderStatus::Ongoing);
    }
}
