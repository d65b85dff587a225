//! CreatePortalHandler - opens the provider's customer portal.

use std::sync::Arc;
use std::time::Duration;

use super::call_provider;
use crate::application::RedirectPolicy;
use crate::domain::entitlement::BillingError;
use crate::domain::foundation::AccountId;
use crate::ports::{BillingProvider, EntitlementStore, PortalSessionRequest};

#[derive(Debug, Clone)]
pub struct CreatePortalCommand {
    pub account_id: AccountId,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePortalResult {
    pub url: String,
}

pub struct CreatePortalHandler {
    provider: Arc<dyn BillingProvider>,
    store: Arc<dyn EntitlementStore>,
    policy: RedirectPolicy,
    timeout: Duration,
}

impl CreatePortalHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        store: Arc<dyn EntitlementStore>,
        policy: RedirectPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            policy,
            timeout,
        }
    }

    pub async fn handle(&self, cmd: CreatePortalCommand) -> Result<CreatePortalResult, BillingError> {
        let return_url = self.policy.check("return_url", &cmd.return_url)?;

        let current = self
            .store
            .get(&cmd.account_id)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?;

        // Cancelled accounts keep their customer and may still manage invoices
        let customer_ref = current
            .refs
            .customer_ref
            .ok_or(BillingError::NoBillingCustomer)?;

        let session = call_provider(
            self.timeout,
            self.provider.create_portal_session(PortalSessionRequest {
                customer_ref,
                return_url: return_url.into(),
            }),
        )
        .await?;

        tracing::info!(account_id = %cmd.account_id, "Portal session created");

        Ok(CreatePortalResult { url: session.url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::adapters::stripe::{MockBillingProvider, ProviderCall};
    use crate::domain::entitlement::{
        AccountEntitlement, FeatureMask, PlanTier, ProviderRefs, SubscriptionStatus,
    };
    use chrono::Utc;

    fn command(return_url: &str) -> CreatePortalCommand {
        CreatePortalCommand {
            account_id: AccountId::new("acc1").unwrap(),
            return_url: return_url.to_string(),
        }
    }

    async fn setup(
        customer_ref: Option<&str>,
    ) -> (Arc<MockBillingProvider>, CreatePortalHandler) {
        let store = Arc::new(InMemoryBillingStore::new());
        if let Some(customer_ref) = customer_ref {
            store
                .insert(AccountEntitlement {
                    account_id: AccountId::new("acc1").unwrap(),
                    plan: PlanTier::None,
                    feature_mask: FeatureMask::EMPTY,
                    status: SubscriptionStatus::Cancelled,
                    updated_at: Utc::now(),
                    refs: ProviderRefs::new(Some(customer_ref.to_string()), None),
                })
                .await;
        }
        let provider = Arc::new(MockBillingProvider::new());
        let handler = CreatePortalHandler::new(
            provider.clone(),
            store,
            RedirectPolicy::new("https://app.example.com").unwrap(),
            Duration::from_secs(1),
        );
        (provider, handler)
    }

    #[tokio::test]
    async fn opens_portal_for_known_customer() {
        let (provider, handler) = setup(Some("cus_1")).await;

        let result = handler
            .handle(command("https://app.example.com/account"))
            .await
            .unwrap();

        assert_eq!(result.url, "https://billing.mock/portal/bps_mock_cus_1");
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::Portal(PortalSessionRequest {
                customer_ref: "cus_1".to_string(),
                return_url: "https://app.example.com/account".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn account_without_customer_is_rejected() {
        let (provider, handler) = setup(None).await;

        let result = handler.handle(command("https://app.example.com/account")).await;

        assert!(matches!(result, Err(BillingError::NoBillingCustomer)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn foreign_return_url_is_rejected() {
        let (provider, handler) = setup(Some("cus_1")).await;

        let result = handler.handle(command("https://elsewhere.io/account")).await;

        assert!(matches!(
            result,
            Err(BillingError::InvalidRedirectUrl { field: "return_url", .. })
        ));
        assert!(provider.calls().is_empty());
    }
}
