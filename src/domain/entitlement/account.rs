//! Account entitlement record and its read-side snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Feature, FeatureMask, PlanTier, SubscriptionStatus, TierMasks};
use crate::domain::foundation::AccountId;

/// Billing provider references attached to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRefs {
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
}

impl ProviderRefs {
    pub fn new(customer_ref: Option<String>, subscription_ref: Option<String>) -> Self {
        Self {
            customer_ref,
            subscription_ref,
        }
    }

    /// Overlays the references present in `newer` onto `self`.
    pub fn merged_with(&self, newer: &ProviderRefs) -> ProviderRefs {
        ProviderRefs {
            customer_ref: newer
                .customer_ref
                .clone()
                .or_else(|| self.customer_ref.clone()),
            subscription_ref: newer
                .subscription_ref
                .clone()
                .or_else(|| self.subscription_ref.clone()),
        }
    }
}

/// The only write an entitlement store accepts.
///
/// Plan, mask and status travel together so they can never be updated
/// independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementTransition {
    pub account_id: AccountId,
    pub plan: PlanTier,
    pub feature_mask: FeatureMask,
    pub status: SubscriptionStatus,
    pub refs: ProviderRefs,
    pub applied_at: DateTime<Utc>,
}

/// Current entitlement state of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntitlement {
    pub account_id: AccountId,
    pub plan: PlanTier,
    pub feature_mask: FeatureMask,
    pub status: SubscriptionStatus,
    pub updated_at: DateTime<Utc>,
    pub refs: ProviderRefs,
}

impl AccountEntitlement {
    /// State of an account the store has never written.
    pub fn inactive(account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            plan: PlanTier::None,
            feature_mask: FeatureMask::EMPTY,
            status: SubscriptionStatus::Inactive,
            updated_at: now,
            refs: ProviderRefs::default(),
        }
    }

    /// Returns the state after `transition`.
    pub fn applied(&self, transition: &EntitlementTransition) -> AccountEntitlement {
        AccountEntitlement {
            account_id: transition.account_id.clone(),
            plan: transition.plan,
            feature_mask: transition.feature_mask,
            status: transition.status,
            updated_at: transition.applied_at,
            refs: transition.refs.clone(),
        }
    }

    /// True when `transition` would leave everything but the timestamp as is.
    pub fn is_same_state(&self, transition: &EntitlementTransition) -> bool {
        self.plan == transition.plan
            && self.feature_mask == transition.feature_mask
            && self.status == transition.status
            && self.refs == transition.refs
    }

    /// Checks the plan/mask/status invariant against a tier table.
    pub fn is_consistent_with(&self, masks: &TierMasks) -> bool {
        if self.status.grants_features() {
            self.plan.is_paid() && self.feature_mask == masks.mask_for(self.plan)
        } else {
            self.plan == PlanTier::None && self.feature_mask.is_empty()
        }
    }

    /// Short SHA-256 digest of the resulting state, for the audit trail.
    ///
    /// Covers everything but `updated_at`, so equal states digest equally.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.account_id.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.plan.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.feature_mask.bits().to_be_bytes());
        hasher.update(self.status.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.refs.customer_ref.as_deref().unwrap_or("").as_bytes());
        hasher.update([0]);
        hasher.update(self.refs.subscription_ref.as_deref().unwrap_or("").as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }

    pub fn snapshot(&self) -> EntitlementSnapshot {
        EntitlementSnapshot {
            account_id: self.account_id.clone(),
            plan: self.plan,
            status: self.status,
            feature_mask: self.feature_mask.bits(),
            features: self.feature_mask.features(),
            updated_at: self.updated_at,
        }
    }
}

/// Read model handed to callers and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    pub account_id: AccountId,
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    pub feature_mask: u32,
    pub features: Vec<Feature>,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementSnapshot {
    pub fn has_feature(&self, feature: Feature) -> bool {
        FeatureMask::from_bits(self.feature_mask).contains(feature)
    }
}
