//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult, CreatePortalCommand,
    CreatePortalHandler, CreatePortalResult, GetEntitlementHandler, HandleBillingWebhookCommand,
    HandleBillingWebhookHandler, ReconciliationEngine,
};
