//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Json, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::{
    CreateCheckoutCommand, CreateCheckoutHandler, CreatePortalCommand, CreatePortalHandler,
    GetEntitlementHandler, HandleBillingWebhookCommand, HandleBillingWebhookHandler,
    ReconciliationEngine, RedirectPolicy,
};
use crate::domain::billing::{WebhookError, WebhookVerifier};
use crate::domain::entitlement::BillingError;
use crate::domain::foundation::{AccountId, DomainError};
use crate::ports::{BillingProvider, EntitlementStore};

use super::dto::{
    CreateCheckoutRequest, CreatePortalRequest, EntitlementResponse, ErrorResponse,
    HealthResponse, RedirectResponse, WebhookAckResponse,
};

/// Signature header names, in order of preference.
pub const SIGNATURE_HEADERS: [&str; 2] = ["Billing-Signature", "Stripe-Signature"];

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request. The reconciliation engine is shared so every
/// request goes through the same per-account locks.
#[derive(Clone)]
pub struct BillingAppState {
    pub verifier: Arc<WebhookVerifier>,
    pub engine: Arc<ReconciliationEngine>,
    pub entitlement_store: Arc<dyn EntitlementStore>,
    pub billing_provider: Arc<dyn BillingProvider>,
    pub redirect_policy: RedirectPolicy,
    pub provider_timeout: Duration,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    pub fn webhook_handler(&self) -> HandleBillingWebhookHandler {
        HandleBillingWebhookHandler::new(self.verifier.clone(), self.engine.clone())
    }

    pub fn checkout_handler(&self) -> CreateCheckoutHandler {
        CreateCheckoutHandler::new(
            self.billing_provider.clone(),
            self.entitlement_store.clone(),
            self.redirect_policy.clone(),
            self.provider_timeout,
        )
    }

    pub fn portal_handler(&self) -> CreatePortalHandler {
        CreatePortalHandler::new(
            self.billing_provider.clone(),
            self.entitlement_store.clone(),
            self.redirect_policy.clone(),
            self.provider_timeout,
        )
    }

    pub fn entitlement_handler(&self) -> GetEntitlementHandler {
        GetEntitlementHandler::new(self.entitlement_store.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Account Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Calling account, taken from the `X-Account-Id` header.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account_id: AccountId,
}

/// Rejection type for AccountContext extraction.
pub struct AccountRequired;

impl IntoResponse for AccountRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = AccountRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .headers
            .get("X-Account-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| AccountId::new(s).ok())
            .ok_or(AccountRequired)?;

        Ok(AccountContext { account_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/billing/entitlement - Current plan, status and features
pub async fn get_entitlement(
    State(state): State<BillingAppState>,
    account: AccountContext,
) -> Result<impl IntoResponse, BillingApiError> {
    let snapshot = state
        .entitlement_handler()
        .handle(&account.account_id)
        .await?;

    Ok(Json(EntitlementResponse::from(snapshot)))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/checkout - Start a hosted checkout
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    account: AccountContext,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreateCheckoutCommand {
        account_id: account.account_id,
        tier: request.tier,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    let result = state.checkout_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(RedirectResponse { url: result.url })))
}

/// POST /api/billing/portal - Open the provider's customer portal
pub async fn create_portal(
    State(state): State<BillingAppState>,
    account: AccountContext,
    Json(request): Json<CreatePortalRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreatePortalCommand {
        account_id: account.account_id,
        return_url: request.return_url,
    };

    let result = state.portal_handler().handle(cmd).await?;

    Ok(Json(RedirectResponse { url: result.url }))
}

/// POST /api/webhooks/billing - Signed provider events
///
/// The body is taken as raw bytes; the signature covers them exactly.
pub async fn handle_billing_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let outcome = state.webhook_handler().handle(cmd).await?;

    Ok((outcome.status_code(), Json(WebhookAckResponse::from(outcome))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts application errors to HTTP responses.
#[derive(Debug)]
pub enum BillingApiError {
    Webhook(WebhookError),
    Billing(BillingError),
    Domain(DomainError),
}

impl From<WebhookError> for BillingApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self::Billing(err)
    }
}

impl From<DomainError> for BillingApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            BillingApiError::Webhook(err) => {
                let body = ErrorResponse::new(err.code(), err.to_string());
                let body = if err.is_retryable() { body.retryable() } else { body };
                (err.status_code(), body)
            }
            BillingApiError::Billing(err) => {
                (err.status_code(), ErrorResponse::new(err.code(), err.to_string()))
            }
            BillingApiError::Domain(err) => {
                tracing::error!(error = %err, "Entitlement lookup failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new(err.code.to_string(), "Entitlements are temporarily unavailable")
                        .retryable(),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_errors_keep_their_status() {
        let response = BillingApiError::from(WebhookError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response =
            BillingApiError::from(WebhookError::StorageFailure("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn billing_errors_keep_their_status() {
        let response = BillingApiError::from(BillingError::NoBillingCustomer).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn domain_errors_are_unavailable() {
        let response = BillingApiError::from(DomainError::database("pool timed out")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
