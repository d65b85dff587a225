//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `EntitlementStore` - Per-account plan, mask and status
//! - `IdempotencyLedger` - Billing events already handled
//! - `ReconciliationStore` - Both of the above, with an atomic commit
//!
//! ## Outbound Ports
//!
//! - `BillingProvider` - Checkout and portal session issuance
//! - `Notifier` - Best-effort plan-change notifications

mod billing_provider;
mod entitlement_store;
mod idempotency_ledger;
mod notifier;

pub use billing_provider::{
    BillingProvider, BillingProviderError, BillingProviderErrorCode, CheckoutSessionRequest,
    PortalSessionRequest, RedirectSession,
};
pub use entitlement_store::EntitlementStore;
pub use idempotency_ledger::{
    BillingEventRecord, CommitResult, IdempotencyLedger, LedgerOutcome, ReconciliationStore,
    SaveResult,
};
pub use notifier::{Notifier, PlanChangedMessage, BILLING_CHANNEL};
