//! Request and response bodies for billing endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::billing::WebhookOutcome;
use crate::domain::entitlement::EntitlementSnapshot;

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/billing/checkout`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    /// `basic` or `premium`.
    pub tier: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Body of `POST /api/billing/portal`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePortalRequest {
    pub return_url: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

/// Provider URL to send the browser to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedirectResponse {
    pub url: String,
}

/// Current entitlement of the calling account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementResponse {
    pub account_id: String,
    pub plan: String,
    pub status: String,
    pub feature_mask: u32,
    pub features: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<EntitlementSnapshot> for EntitlementResponse {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        Self {
            account_id: snapshot.account_id.to_string(),
            plan: snapshot.plan.as_str().to_string(),
            status: snapshot.status.as_str().to_string(),
            feature_mask: snapshot.feature_mask,
            features: snapshot
                .features
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            updated_at: snapshot.updated_at,
        }
    }
}

/// Acknowledgment returned to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub outcome: String,
}

impl From<WebhookOutcome> for WebhookAckResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        Self {
            received: true,
            outcome: outcome.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body shared by all billing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Set when the caller (usually the provider) should try again.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}
