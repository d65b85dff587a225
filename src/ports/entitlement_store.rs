//! EntitlementStore port - persistence of per-account entitlements.
//!
//! The store owns the only writable copy of plan, mask and status. It knows
//! nothing about the billing protocol.

use async_trait::async_trait;

use crate::domain::entitlement::{AccountEntitlement, EntitlementTransition};
use crate::domain::foundation::{AccountId, DomainError};

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Current entitlement for an account.
    ///
    /// Accounts the store has never written are returned as inactive.
    async fn get(&self, account_id: &AccountId) -> Result<AccountEntitlement, DomainError>;

    /// Finds the account currently linked to a provider subscription.
    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<AccountId>, DomainError>;

    /// Writes plan, mask, status and refs together.
    ///
    /// Must be all-or-nothing. Callers serialize writes per account.
    async fn apply_transition(
        &self,
        transition: &EntitlementTransition,
    ) -> Result<AccountEntitlement, DomainError>;
}
