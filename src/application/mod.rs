//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Webhook reconciliation is the only write path for entitlements; session
//! issuance and entitlement reads never change local state.

pub mod handlers;
mod keyed_lock;
mod redirect_policy;

pub use handlers::{
    CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult, CreatePortalCommand,
    CreatePortalHandler, CreatePortalResult, GetEntitlementHandler, HandleBillingWebhookCommand,
    HandleBillingWebhookHandler, ReconciliationEngine,
};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use redirect_policy::RedirectPolicy;
