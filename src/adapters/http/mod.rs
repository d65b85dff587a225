//! HTTP adapters - REST API implementations.

pub mod billing;

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use billing::{billing_router, BillingAppState};

/// Upper bound on any request body. Webhook bodies are held to the tighter
/// configured limit by the verifier.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Builds the complete application router with its middleware stack.
pub fn app_router(state: BillingAppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", billing_router())
        .route("/health", get(billing::health))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
