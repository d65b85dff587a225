//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/webhooks/billing` - Signed provider events
//! - `POST /api/billing/checkout` - Start a hosted checkout
//! - `POST /api/billing/portal` - Open the customer portal
//! - `GET /api/billing/entitlement` - Current entitlement

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{health, AccountContext, BillingApiError, BillingAppState, SIGNATURE_HEADERS};
pub use routes::{billing_router, billing_routes, webhook_routes};
