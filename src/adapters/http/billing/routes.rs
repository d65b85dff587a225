//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_checkout, create_portal, get_entitlement, handle_billing_webhook, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Account Endpoints (require `X-Account-Id`)
/// - `POST /checkout` - Start a hosted checkout for a paid tier
/// - `POST /portal` - Open the customer portal
/// - `GET /entitlement` - Current plan, status and features
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .route("/entitlement", get(get_entitlement))
}

/// Create the provider webhook router.
///
/// Separate from the account routes because webhooks carry no account
/// identity; they are authenticated by signature.
///
/// # Routes
/// - `POST /billing` - Signed provider events
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/billing", post(handle_billing_webhook))
}

/// Create the complete billing module router, for mounting at `/api`.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/billing", billing_routes())
        .nest("/webhooks", webhook_routes())
}
