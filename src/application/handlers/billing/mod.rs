//! Billing handlers.
//!
//! ## Commands
//! - Handling signed provider webhooks
//! - Creating checkout sessions
//! - Creating customer portal sessions
//!
//! ## Queries
//! - Get an account's current entitlement

mod create_checkout;
mod create_portal;
mod get_entitlement;
mod handle_billing_webhook;
mod reconcile_billing_event;

use std::future::Future;
use std::time::Duration;

use crate::domain::entitlement::BillingError;
use crate::ports::{BillingProviderError, RedirectSession};

// Commands
pub use create_checkout::{CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult};
pub use create_portal::{CreatePortalCommand, CreatePortalHandler, CreatePortalResult};
pub use handle_billing_webhook::{HandleBillingWebhookCommand, HandleBillingWebhookHandler};
pub use reconcile_billing_event::ReconciliationEngine;

// Queries
pub use get_entitlement::GetEntitlementHandler;

/// Runs a provider call under `timeout`. Failures are reported to the
/// caller as-is; nothing is retried here.
async fn call_provider<F>(timeout: Duration, call: F) -> Result<RedirectSession, BillingError>
where
    F: Future<Output = Result<RedirectSession, BillingProviderError>>,
{
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BillingProviderError::timeout(timeout.as_secs())),
    };

    result.map_err(|e| {
        tracing::warn!(code = %e.code, provider_code = ?e.provider_code, error = %e, "Billing provider call failed");
        BillingError::BillingProvider(e.to_string())
    })
}
