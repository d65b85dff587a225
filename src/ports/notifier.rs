//! Notifier port - best-effort push to a user's live session.
//!
//! Delivery guarantees belong to the implementation. Callers never await a
//! notification while holding an account lock and never let its failure
//! affect persisted entitlements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entitlement::{EntitlementSnapshot, PlanTier, SubscriptionStatus};
use crate::domain::foundation::{AccountId, DomainError};

/// Channel used for plan-change notifications.
pub const BILLING_CHANNEL: &str = "billing";

/// Payload telling a session its plan changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChangedMessage {
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    pub feature_mask: u32,
}

impl From<&EntitlementSnapshot> for PlanChangedMessage {
    fn from(snapshot: &EntitlementSnapshot) -> Self {
        Self {
            plan: snapshot.plan,
            status: snapshot.status,
            feature_mask: snapshot.feature_mask,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        account_id: &AccountId,
        channel: &str,
        message: &PlanChangedMessage,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn Notifier) {}

    #[test]
    fn message_serializes_wire_names() {
        let message = PlanChangedMessage {
            plan: PlanTier::Premium,
            status: SubscriptionStatus::PastDue,
            feature_mask: 3,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["plan"], "premium");
        assert_eq!(json["status"], "past_due");
        assert_eq!(json["feature_mask"], 3);
    }
}
