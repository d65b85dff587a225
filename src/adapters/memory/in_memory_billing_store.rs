//! In-memory entitlement store and idempotency ledger.
//!
//! Accounts and ledger share one lock, which makes `commit` atomic by
//! construction. Intended for development and tests; state is lost on
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::domain::entitlement::{AccountEntitlement, EntitlementTransition};
use crate::domain::foundation::{AccountId, BillingEventId, DomainError};
use crate::ports::{
    BillingEventRecord, CommitResult, EntitlementStore, IdempotencyLedger, ReconciliationStore,
    SaveResult,
};

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, AccountEntitlement>,
    ledger: HashMap<BillingEventId, BillingEventRecord>,
    /// Event ids in the order they were recorded.
    handled: Vec<BillingEventId>,
}

/// Reconciliation store backed by process memory.
///
/// Exposes a write counter and the handling order so tests can assert
/// that rejected or duplicate deliveries never reached storage.
#[derive(Default)]
pub struct InMemoryBillingStore {
    state: RwLock<State>,
    entitlement_writes: AtomicU64,
    failing: AtomicBool,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Number of entitlement writes performed.
    pub fn write_count(&self) -> u64 {
        self.entitlement_writes.load(Ordering::SeqCst)
    }

    pub async fn ledger_len(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    /// Event ids in the order the store recorded them.
    pub async fn handled_order(&self) -> Vec<BillingEventId> {
        self.state.read().await.handled.clone()
    }

    /// Makes every mutating call fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seeds an account directly, bypassing the ledger.
    pub async fn insert(&self, entitlement: AccountEntitlement) {
        self.state
            .write()
            .await
            .accounts
            .insert(entitlement.account_id.clone(), entitlement);
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::database("in-memory store unavailable"));
        }
        Ok(())
    }

    fn write(state: &mut State, transition: &EntitlementTransition) -> AccountEntitlement {
        let current = state
            .accounts
            .get(&transition.account_id)
            .cloned()
            .unwrap_or_else(|| {
                AccountEntitlement::inactive(transition.account_id.clone(), transition.applied_at)
            });
        let next = current.applied(transition);
        state
            .accounts
            .insert(transition.account_id.clone(), next.clone());
        next
    }
}

#[async_trait]
impl EntitlementStore for InMemoryBillingStore {
    async fn get(&self, account_id: &AccountId) -> Result<AccountEntitlement, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| AccountEntitlement::inactive(account_id.clone(), Utc::now())))
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<AccountId>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.refs.subscription_ref.as_deref() == Some(subscription_ref))
            .map(|a| a.account_id.clone()))
    }

    async fn apply_transition(
        &self,
        transition: &EntitlementTransition,
    ) -> Result<AccountEntitlement, DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let next = Self::write(&mut state, transition);
        self.entitlement_writes.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryBillingStore {
    async fn contains(&self, event_id: &BillingEventId) -> Result<bool, DomainError> {
        Ok(self.state.read().await.ledger.contains_key(event_id))
    }

    async fn find(
        &self,
        event_id: &BillingEventId,
    ) -> Result<Option<BillingEventRecord>, DomainError> {
        Ok(self.state.read().await.ledger.get(event_id).cloned())
    }

    async fn record(&self, record: &BillingEventRecord) -> Result<SaveResult, DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.ledger.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        state.ledger.insert(record.event_id.clone(), record.clone());
        state.handled.push(record.event_id.clone());
        Ok(SaveResult::Inserted)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.ledger.len();
        state.ledger.retain(|_, record| record.applied_at >= cutoff);
        Ok((before - state.ledger.len()) as u64)
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryBillingStore {
    async fn commit(
        &self,
        transition: &EntitlementTransition,
        record: &BillingEventRecord,
    ) -> Result<CommitResult, DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.ledger.contains_key(&record.event_id) {
            return Ok(CommitResult::AlreadyRecorded);
        }
        let next = Self::write(&mut state, transition);
        state.ledger.insert(record.event_id.clone(), record.clone());
        state.handled.push(record.event_id.clone());
        self.entitlement_writes.fetch_add(1, Ordering::SeqCst);
        Ok(CommitResult::Committed(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{
        FeatureMask, PlanTier, ProviderRefs, SubscriptionStatus, TierMasks,
    };
    use crate::ports::LedgerOutcome;

    fn account() -> AccountId {
        AccountId::new("acc1").unwrap()
    }

    fn activate() -> EntitlementTransition {
        EntitlementTransition {
            account_id: account(),
            plan: PlanTier::Basic,
            feature_mask: TierMasks::default().mask_for(PlanTier::Basic),
            status: SubscriptionStatus::Active,
            refs: ProviderRefs::new(Some("cus_1".into()), Some("sub_1".into())),
            applied_at: Utc::now(),
        }
    }

    fn record(id: &str, outcome: LedgerOutcome) -> BillingEventRecord {
        BillingEventRecord::new(
            BillingEventId::new(id).unwrap(),
            "checkout.session.completed",
            Some(account()),
            outcome,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn unknown_account_reads_as_inactive() {
        let store = InMemoryBillingStore::new();
        let ent = store.get(&account()).await.unwrap();
        assert_eq!(ent.status, SubscriptionStatus::Inactive);
        assert_eq!(ent.feature_mask, FeatureMask::EMPTY);
    }

    #[tokio::test]
    async fn commit_writes_entitlement_and_ledger_together() {
        let store = InMemoryBillingStore::new();

        let result = store
            .commit(&activate(), &record("evt_1", LedgerOutcome::Applied))
            .await
            .unwrap();

        assert!(matches!(result, CommitResult::Committed(_)));
        assert_eq!(store.get(&account()).await.unwrap().plan, PlanTier::Basic);
        assert!(store
            .contains(&BillingEventId::new("evt_1").unwrap())
            .await
            .unwrap());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn commit_of_recorded_event_writes_nothing() {
        let store = InMemoryBillingStore::new();
        store
            .commit(&activate(), &record("evt_1", LedgerOutcome::Applied))
            .await
            .unwrap();

        let result = store
            .commit(&activate(), &record("evt_1", LedgerOutcome::Applied))
            .await
            .unwrap();

        assert_eq!(result, CommitResult::AlreadyRecorded);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn failing_store_commits_nothing() {
        let store = InMemoryBillingStore::new();
        store.set_failing(true);

        let result = store
            .commit(&activate(), &record("evt_1", LedgerOutcome::Applied))
            .await;

        assert!(result.is_err());
        store.set_failing(false);
        assert_eq!(store.ledger_len().await, 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn record_reports_duplicates() {
        let store = InMemoryBillingStore::new();
        let first = store.record(&record("evt_1", LedgerOutcome::Ignored)).await.unwrap();
        let second = store.record(&record("evt_1", LedgerOutcome::Ignored)).await.unwrap();

        assert_eq!(first, SaveResult::Inserted);
        assert_eq!(second, SaveResult::AlreadyExists);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn finds_account_by_subscription_ref() {
        let store = InMemoryBillingStore::new();
        store.apply_transition(&activate()).await.unwrap();

        assert_eq!(
            store.find_by_subscription_ref("sub_1").await.unwrap(),
            Some(account())
        );
        assert_eq!(store.find_by_subscription_ref("sub_2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_before_prunes_old_entries() {
        let store = InMemoryBillingStore::new();
        let mut old = record("evt_old", LedgerOutcome::Applied);
        old.applied_at = Utc::now() - chrono::Duration::days(40);
        store.record(&old).await.unwrap();
        store.record(&record("evt_new", LedgerOutcome::Applied)).await.unwrap();

        let deleted = store
            .delete_before(Utc::now() - chrono::Duration::days(30))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.ledger_len().await, 1);
    }
}
