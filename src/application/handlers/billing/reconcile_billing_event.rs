//! ReconciliationEngine - applies verified billing events to entitlements.
//!
//! ## Steps
//!
//! 1. Translate the event into a signal; unknown types are recorded as
//!    ignored and unusable events as rejected
//! 2. Resolve the account (event data, else the subscription reference)
//! 3. Under the account's lock: ledger check, pure transition, atomic commit
//! 4. After the lock is released: fire-and-forget notification
//!
//! ## Race Condition Handling
//!
//! Deliveries for one account are serialized by [`KeyedLocks`]. Two
//! deliveries of the same event that resolve to different keys still
//! cannot both commit: the ledger insert decides, and the loser sees
//! `AlreadyRecorded`.

use std::sync::Arc;

use chrono::Utc;

use crate::application::KeyedLocks;
use crate::domain::billing::{BillingEvent, MalformedEvent, WebhookError, WebhookOutcome};
use crate::domain::entitlement::{
    reconcile, AccountEntitlement, BillingSignal, Reconciliation, TierMasks,
};
use crate::domain::foundation::{AccountId, DomainError};
use crate::ports::{
    BillingEventRecord, CommitResult, LedgerOutcome, Notifier, PlanChangedMessage,
    ReconciliationStore, SaveResult, BILLING_CHANNEL,
};

pub struct ReconciliationEngine {
    store: Arc<dyn ReconciliationStore>,
    notifier: Arc<dyn Notifier>,
    masks: TierMasks,
    locks: KeyedLocks,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn ReconciliationStore>,
        notifier: Arc<dyn Notifier>,
        masks: TierMasks,
    ) -> Self {
        Self {
            store,
            notifier,
            masks,
            locks: KeyedLocks::new(),
        }
    }

    pub fn masks(&self) -> &TierMasks {
        &self.masks
    }

    /// Applies one verified event.
    ///
    /// Returns an outcome for every event that should be acknowledged, and
    /// an error only when the provider should redeliver or the event can
    /// never be used.
    pub async fn apply(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError> {
        if self
            .store
            .contains(&event.event_id)
            .await
            .map_err(storage_failure)?
        {
            return Ok(WebhookOutcome::Duplicate);
        }

        let signal = match event.signal() {
            Ok(Some(signal)) => signal,
            Ok(None) => return self.record_unknown(event).await,
            Err(malformed) => return self.reject(&malformed).await,
        };

        let account_id = self.resolve_account(event).await?;

        let (outcome, applied) = {
            let _guard = self.locks.lock(account_id.as_str()).await;
            self.apply_locked(event, &signal, &account_id).await?
        };

        if let Some(entitlement) = applied {
            self.spawn_notification(entitlement);
        }

        Ok(outcome)
    }

    /// Records an authentic event that can never be applied.
    ///
    /// The entitlement is untouched; the ledger row is the durable trace
    /// for manual review, and it stops further deliveries being reprocessed.
    pub async fn reject(&self, malformed: &MalformedEvent) -> Result<WebhookOutcome, WebhookError> {
        let record = BillingEventRecord::new(
            malformed.event_id.clone(),
            malformed.event_type.as_str(),
            malformed.account_id.clone(),
            LedgerOutcome::Rejected,
            None,
            Utc::now(),
        )
        .with_detail(malformed.reason.as_str());
        if !self.record(record).await? {
            return Ok(WebhookOutcome::Duplicate);
        }
        tracing::warn!(
            event_id = %malformed.event_id,
            event_type = %malformed.event_type,
            reason = %malformed.reason,
            requires_manual_review = true,
            "Unusable billing event recorded"
        );
        Ok(WebhookOutcome::Rejected)
    }

    /// Deletes ledger entries older than `retention`.
    pub async fn prune_ledger(&self, retention: chrono::Duration) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - retention;
        let deleted = self.store.delete_before(cutoff).await?;
        tracing::info!(deleted, cutoff = %cutoff, "Pruned billing event ledger");
        Ok(deleted)
    }

    async fn apply_locked(
        &self,
        event: &BillingEvent,
        signal: &BillingSignal,
        account_id: &AccountId,
    ) -> Result<(WebhookOutcome, Option<AccountEntitlement>), WebhookError> {
        // Authoritative check: an earlier holder of this lock may have just
        // recorded the same event.
        if self
            .store
            .contains(&event.event_id)
            .await
            .map_err(storage_failure)?
        {
            return Ok((WebhookOutcome::Duplicate, None));
        }

        let current = self.store.get(account_id).await.map_err(storage_failure)?;
        let now = Utc::now();
        let event_type = event.event_type.as_str();

        match reconcile(&current, signal, &self.masks, now) {
            Reconciliation::Apply(transition) => {
                let resulting = current.applied(&transition);
                let record = BillingEventRecord::new(
                    event.event_id.clone(),
                    event_type,
                    Some(account_id.clone()),
                    LedgerOutcome::Applied,
                    Some(&resulting),
                    now,
                );

                match self
                    .store
                    .commit(&transition, &record)
                    .await
                    .map_err(storage_failure)?
                {
                    CommitResult::Committed(next) => {
                        tracing::info!(
                            event_id = %event.event_id,
                            event_type,
                            account_id = %account_id,
                            plan = %next.plan,
                            status = %next.status,
                            feature_mask = %next.feature_mask,
                            "Billing event applied"
                        );
                        Ok((WebhookOutcome::Applied, Some(next)))
                    }
                    CommitResult::AlreadyRecorded => Ok((WebhookOutcome::Duplicate, None)),
                }
            }
            Reconciliation::Unchanged => {
                let record = BillingEventRecord::new(
                    event.event_id.clone(),
                    event_type,
                    Some(account_id.clone()),
                    LedgerOutcome::Unchanged,
                    Some(&current),
                    now,
                );
                if !self.record(record).await? {
                    return Ok((WebhookOutcome::Duplicate, None));
                }
                tracing::info!(
                    event_id = %event.event_id,
                    event_type,
                    account_id = %account_id,
                    "Billing event already reflected in entitlement"
                );
                Ok((WebhookOutcome::Unchanged, None))
            }
            Reconciliation::Conflict { reason } => {
                let record = BillingEventRecord::new(
                    event.event_id.clone(),
                    event_type,
                    Some(account_id.clone()),
                    LedgerOutcome::Conflict,
                    Some(&current),
                    now,
                )
                .with_detail(reason.clone());
                if !self.record(record).await? {
                    return Ok((WebhookOutcome::Duplicate, None));
                }
                tracing::warn!(
                    event_id = %event.event_id,
                    event_type,
                    account_id = %account_id,
                    status = %current.status,
                    reason = %reason,
                    requires_manual_review = true,
                    "Billing event conflicts with entitlement state"
                );
                Ok((WebhookOutcome::TransitionConflict, None))
            }
        }
    }

    async fn record_unknown(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError> {
        let record = BillingEventRecord::new(
            event.event_id.clone(),
            event.event_type.as_str(),
            event.data.account_id.clone(),
            LedgerOutcome::Ignored,
            None,
            Utc::now(),
        );
        if !self.record(record).await? {
            return Ok(WebhookOutcome::Duplicate);
        }
        tracing::info!(
            event_id = %event.event_id,
            event_type = event.event_type.as_str(),
            "Unknown billing event type acknowledged"
        );
        Ok(WebhookOutcome::UnknownEventType)
    }

    /// Records a ledger-only entry. Returns false if the event was already there.
    async fn record(&self, record: BillingEventRecord) -> Result<bool, WebhookError> {
        let result = self.store.record(&record).await.map_err(storage_failure)?;
        Ok(result == SaveResult::Inserted)
    }

    async fn resolve_account(&self, event: &BillingEvent) -> Result<AccountId, WebhookError> {
        if let Some(account_id) = &event.data.account_id {
            return Ok(account_id.clone());
        }
        let subscription_ref = event
            .data
            .subscription_ref
            .as_deref()
            .ok_or(WebhookError::AccountNotResolved)?;

        self.store
            .find_by_subscription_ref(subscription_ref)
            .await
            .map_err(storage_failure)?
            .ok_or(WebhookError::AccountNotResolved)
    }

    fn spawn_notification(&self, entitlement: AccountEntitlement) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let message = PlanChangedMessage::from(&entitlement.snapshot());
            if let Err(e) = notifier
                .notify(&entitlement.account_id, BILLING_CHANNEL, &message)
                .await
            {
                tracing::warn!(
                    account_id = %entitlement.account_id,
                    error = %e,
                    "Failed to deliver plan change notification"
                );
            }
        });
    }
}

fn storage_failure(err: DomainError) -> WebhookError {
    tracing::error!(error = %err, "Billing store operation failed");
    WebhookError::StorageFailure(err.to_string())
}
