//! BillingProvider port - short-lived redirect sessions with the provider.
//!
//! Sessions are minted on demand and never stored locally. Entitlements
//! only change when the provider later confirms through a webhook, since a
//! session may be abandoned.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entitlement::PlanTier;
use crate::domain::foundation::AccountId;

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Creates a hosted checkout session for a paid tier.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<RedirectSession, BillingProviderError>;

    /// Creates a customer portal session for subscription management.
    async fn create_portal_session(
        &self,
        request: PortalSessionRequest,
    ) -> Result<RedirectSession, BillingProviderError>;
}

/// Request to open a checkout for `tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    /// Echoed back in webhooks so the event can be tied to the account.
    pub account_id: AccountId,
    pub tier: PlanTier,
    /// Existing provider customer, reused when known.
    pub customer_ref: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    /// Sent to the provider so a re-sent request mints one session.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSessionRequest {
    pub customer_ref: String,
    pub return_url: String,
}

/// Provider session the caller redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectSession {
    pub id: String,
    pub url: String,
}

/// Errors from provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingProviderError {
    pub code: BillingProviderErrorCode,
    pub message: String,
    /// Provider's own error code, if it sent one.
    pub provider_code: Option<String>,
}

impl BillingProviderError {
    pub fn new(code: BillingProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BillingProviderErrorCode::NetworkError, message)
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(
            BillingProviderErrorCode::Timeout,
            format!("provider did not respond within {}s", secs),
        )
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BillingProviderErrorCode::Rejected, message)
    }
}

impl std::fmt::Display for BillingProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BillingProviderError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingProviderErrorCode {
    NetworkError,
    Timeout,
    AuthenticationError,
    RateLimited,
    /// Provider refused the request (bad price, unknown customer, ...).
    Rejected,
    /// Response could not be understood.
    InvalidResponse,
}

impl std::fmt::Display for BillingProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingProviderErrorCode::NetworkError => "network_error",
            BillingProviderErrorCode::Timeout => "timeout",
            BillingProviderErrorCode::AuthenticationError => "authentication_error",
            BillingProviderErrorCode::RateLimited => "rate_limited",
            BillingProviderErrorCode::Rejected => "rejected",
            BillingProviderErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}
