//! CreateCheckoutHandler - issues a hosted checkout session.
//!
//! No local state changes here. The entitlement is only granted once the
//! provider confirms payment through a webhook.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::call_provider;
use crate::application::RedirectPolicy;
use crate::domain::entitlement::{BillingError, PlanTier};
use crate::domain::foundation::AccountId;
use crate::ports::{BillingProvider, CheckoutSessionRequest, EntitlementStore};

#[derive(Debug, Clone)]
pub struct CreateCheckoutCommand {
    pub account_id: AccountId,
    pub tier: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutResult {
    pub session_id: String,
    pub url: String,
}

pub struct CreateCheckoutHandler {
    provider: Arc<dyn BillingProvider>,
    store: Arc<dyn EntitlementStore>,
    policy: RedirectPolicy,
    timeout: Duration,
}

impl CreateCheckoutHandler {
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

    pub async fn handle(
        &self,
        cmd: CreateCheckoutCommand,
    ) -> Result<CreateCheckoutResult, BillingError> {
        let tier = PlanTier::parse_paid(&cmd.tier)
            .map_err(|_| BillingError::InvalidTier(cmd.tier.clone()))?;
        let success_url = self.policy.check("success_url", &cmd.success_url)?;
        let cancel_url = self.policy.check("cancel_url", &cmd.cancel_url)?;

        // Reuse the provider customer so a returning account keeps one record
        let current = self
            .store
            .get(&cmd.account_id)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?;

        let request = CheckoutSessionRequest {
            account_id: cmd.account_id.clone(),
            tier,
            customer_ref: current.refs.customer_ref,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            idempotency_key: Uuid::new_v4().to_string(),
        };

        let session = call_provider(
            self.timeout,
            self.provider.create_checkout_session(request),
        )
        .await?;

        tracing::info!(
            account_id = %cmd.account_id,
            tier = %tier,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CreateCheckoutResult {
            session_id: session.id,
            url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::adapters::stripe::{MockBillingProvider, ProviderCall};
    use crate::ports::BillingProviderError;

    fn setup() -> (Arc<MockBillingProvider>, CreateCheckoutHandler) {
        let provider = Arc::new(MockBillingProvider::new());
        let handler = CreateCheckoutHandler::new(
            provider.clone(),
            Arc::new(InMemoryBillingStore::new()),
            RedirectPolicy::new("https://app.example.com").unwrap(),
            Duration::from_millis(200),
        );
        (provider, handler)
    }

    fn command(tier: &str, success_url: &str) -> CreateCheckoutCommand {
        CreateCheckoutCommand {
            account_id: AccountId::new("acc1").unwrap(),
            tier: tier.to_string(),
            success_url: success_url.to_string(),
            cancel_url: "https://app.example.com/pricing".to_string(),
        }
    }

    #[tokio::test]
    async fn returns_provider_redirect_url() {
        let (provider, handler) = setup();

        let result = handler
            .handle(command("premium", "https://app.example.com/welcome"))
            .await
            .unwrap();

        assert!(result.url.starts_with("https://billing.mock/checkout/"));
        match &provider.calls()[..] {
            [ProviderCall::Checkout(request)] => {
                assert_eq!(request.tier, PlanTier::Premium);
                assert_eq!(request.account_id.as_str(), "acc1");
                assert!(request.customer_ref.is_none());
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[tokio::test]
    async fn unpaid_tier_is_rejected_before_provider_call() {
        let (provider, handler) = setup();

        let result = handler
            .handle(command("none", "https://app.example.com/welcome"))
            .await;

        assert!(matches!(result, Err(BillingError::InvalidTier(_))));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn foreign_redirect_is_rejected_before_provider_call() {
        let (provider, handler) = setup();

        let result = handler
            .handle(command("basic", "https://evil.example.net/phish"))
            .await;

        assert!(matches!(
            result,
            Err(BillingError::InvalidRedirectUrl { field: "success_url", .. })
        ));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_surfaces_without_retry() {
        let (provider, handler) = setup();
        provider.fail_next(BillingProviderError::network("connection reset"));

        let result = handler
            .handle(command("basic", "https://app.example.com/welcome"))
            .await;

        assert!(matches!(result, Err(BillingError::BillingProvider(_))));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let (provider, handler) = setup();
        provider.set_delay(Duration::from_secs(5));

        let result = handler
            .handle(command("basic", "https://app.example.com/welcome"))
            .await;

        match result {
            Err(BillingError::BillingProvider(message)) => assert!(message.contains("timeout")),
            other => panic!("expected provider timeout, got {:?}", other),
        }
    }
}
