//! Errors surfaced to callers of checkout and portal issuance.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors from session issuance.
///
/// None of these leave local state behind: sessions are never persisted.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Invalid redirect URL for {field}: {reason}")]
    InvalidRedirectUrl { field: &'static str, reason: String },

    /// The account has no provider customer to open a portal for.
    #[error("Account has no billing customer")]
    NoBillingCustomer,

    #[error("Billing provider error: {0}")]
    BillingProvider(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BillingError {
    pub fn invalid_url(field: &'static str, reason: impl Into<String>) -> Self {
        BillingError::InvalidRedirectUrl {
            field,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BillingError::InvalidTier(_) => "INVALID_TIER",
            BillingError::InvalidRedirectUrl { .. } => "INVALID_REDIRECT_URL",
            BillingError::NoBillingCustomer => "NO_BILLING_CUSTOMER",
            BillingError::BillingProvider(_) => "BILLING_PROVIDER_ERROR",
            BillingError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InvalidTier(_) | BillingError::InvalidRedirectUrl { .. } => {
                StatusCode::BAD_REQUEST
            }
            BillingError::NoBillingCustomer => StatusCode::CONFLICT,
            BillingError::BillingProvider(_) => StatusCode::BAD_GATEWAY,
            BillingError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
