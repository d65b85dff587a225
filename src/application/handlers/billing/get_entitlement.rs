//! GetEntitlementHandler - current entitlement for an account.

use std::sync::Arc;

use crate::domain::entitlement::EntitlementSnapshot;
use crate::domain::foundation::{AccountId, DomainError};
use crate::ports::EntitlementStore;

pub struct GetEntitlementHandler {
    store: Arc<dyn EntitlementStore>,
}

impl GetEntitlementHandler {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self { store }
    }

    /// Accounts the store has never seen read as inactive with no features.
    pub async fn handle(&self, account_id: &AccountId) -> Result<EntitlementSnapshot, DomainError> {
        let entitlement = self.store.get(account_id).await?;
        Ok(entitlement.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::entitlement::{
        AccountEntitlement, Feature, FeatureMask, PlanTier, ProviderRefs, SubscriptionStatus,
        TierMasks,
    };
    use chrono::Utc;

    #[tokio::test]
    async fn unknown_account_is_inactive() {
        let handler = GetEntitlementHandler::new(Arc::new(InMemoryBillingStore::new()));

        let snapshot = handler
            .handle(&AccountId::new("nobody").unwrap())
            .await
            .unwrap();

        assert_eq!(snapshot.plan, PlanTier::None);
        assert_eq!(snapshot.status, SubscriptionStatus::Inactive);
        assert_eq!(snapshot.feature_mask, 0);
        assert!(snapshot.features.is_empty());
    }

    #[tokio::test]
    async fn lists_features_of_stored_plan() {
        let store = Arc::new(InMemoryBillingStore::new());
        let mask = TierMasks::default().mask_for(PlanTier::Basic);
        store
            .insert(AccountEntitlement {
                account_id: AccountId::new("acc1").unwrap(),
                plan: PlanTier::Basic,
                feature_mask: mask,
                status: SubscriptionStatus::Active,
                updated_at: Utc::now(),
                refs: ProviderRefs::default(),
            })
            .await;
        let handler = GetEntitlementHandler::new(store);

        let snapshot = handler.handle(&AccountId::new("acc1").unwrap()).await.unwrap();

        assert_eq!(snapshot.feature_mask, mask.bits());
        assert!(snapshot.has_feature(Feature::Reports));
        assert_ne!(mask, FeatureMask::EMPTY);
    }
}
