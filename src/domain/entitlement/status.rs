//! Subscription status state machine.
//!
//! `inactive -> active -> {past_due, cancelled}`, `past_due -> {active, cancelled}`.
//! `cancelled` is terminal until a new checkout produces a fresh `active`.

use serde::{Deserialize, Serialize};

/// Subscription status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed. No features.
    #[default]
    Inactive,

    /// Paid and current.
    Active,

    /// Latest payment failed. Features are kept during the grace period.
    PastDue,

    /// Subscription ended. No features.
    Cancelled,
}

impl SubscriptionStatus {
    /// Statuses whose feature mask is the plan's canonical mask.
    pub fn grants_features(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inactive" => Some(SubscriptionStatus::Inactive),
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From INACTIVE
            (Inactive, Active)
                | (Inactive, Cancelled)
            // From ACTIVE
                | (Active, Active) // Renewal or plan change
                | (Active, PastDue)
                | (Active, Cancelled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, PastDue) // Dunning retry
                | (PastDue, Cancelled)
            // From CANCELLED
                | (Cancelled, Active) // New checkout only
                | (Cancelled, Cancelled)
        )
    }

    pub fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Inactive => vec![Active, Cancelled],
            Active => vec![Active, PastDue, Cancelled],
            PastDue => vec![Active, PastDue, Cancelled],
            Cancelled => vec![Active, Cancelled],
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
