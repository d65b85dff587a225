//! Mock billing provider for tests and local development.
//!
//! Returns deterministic redirect URLs, records every request, and can be
//! told to fail or to stall.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{
    BillingProvider, BillingProviderError, CheckoutSessionRequest, PortalSessionRequest,
    RedirectSession,
};

/// A request the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Checkout(CheckoutSessionRequest),
    Portal(PortalSessionRequest),
}

#[derive(Default)]
struct MockState {
    calls: Vec<ProviderCall>,
    next_error: Option<BillingProviderError>,
    delay: Option<Duration>,
}

#[derive(Default)]
pub struct MockBillingProvider {
    state: Mutex<MockState>,
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next call with `error`.
    pub fn fail_next(&self, error: BillingProviderError) {
        self.lock().next_error = Some(error);
    }

    /// Sleeps this long before answering every call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn respond(&self, call: ProviderCall) -> Result<(), BillingProviderError> {
        let (delay, error) = {
            let mut state = self.lock();
            state.calls.push(call);
            (state.delay, state.next_error.take())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<RedirectSession, BillingProviderError> {
        let id = format!("cs_mock_{}", request.idempotency_key);
        self.respond(ProviderCall::Checkout(request)).await?;
        Ok(RedirectSession {
            url: format!("https://billing.mock/checkout/{}", id),
            id,
        })
    }

    async fn create_portal_session(
        &self,
        request: PortalSessionRequest,
    ) -> Result<RedirectSession, BillingProviderError> {
        let id = format!("bps_mock_{}", request.customer_ref);
        self.respond(ProviderCall::Portal(request)).await?;
        Ok(RedirectSession {
            url: format!("https://billing.mock/portal/{}", id),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal() -> PortalSessionRequest {
        PortalSessionRequest {
            customer_ref: "cus_1".to_string(),
            return_url: "https://app.example.com/account".to_string(),
        }
    }

    #[tokio::test]
    async fn records_calls_and_returns_url() {
        let mock = MockBillingProvider::new();
        let session = mock.create_portal_session(portal()).await.unwrap();

        assert_eq!(session.url, "https://billing.mock/portal/bps_mock_cus_1");
        assert_eq!(mock.calls(), vec![ProviderCall::Portal(portal())]);
    }

    #[tokio::test]
    async fn injected_error_applies_once() {
        let mock = MockBillingProvider::new();
        mock.fail_next(BillingProviderError::network("connection refused"));

        assert!(mock.create_portal_session(portal()).await.is_err());
        assert!(mock.create_portal_session(portal()).await.is_ok());
    }
}
