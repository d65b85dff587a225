//! Adapters - Implementations of port interfaces.
//!
//! - `http` - axum routes for webhooks, session issuance and entitlement reads
//! - `memory` - in-memory reconciliation store
//! - `notify` - broadcast notifier for plan changes
//! - `postgres` - PostgreSQL reconciliation store
//! - `stripe` - billing provider over the Stripe-style REST API

pub mod http;
pub mod memory;
pub mod notify;
pub mod postgres;
pub mod stripe;

pub use memory::InMemoryBillingStore;
pub use notify::BroadcastNotifier;
pub use postgres::PostgresBillingStore;
pub use stripe::{MockBillingProvider, StripeBillingAdapter, StripeConfig};
