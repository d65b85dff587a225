//! IdempotencyLedger port - record of billing events already handled.
//!
//! The provider delivers at least once, so every event id is recorded the
//! first time it is handled and checked before any later delivery is acted
//! on. Entries are created once and never updated.
//!
//! Implementations must enforce uniqueness of `event_id` themselves
//! (primary key, `ON CONFLICT DO NOTHING`) so concurrent deliveries of the
//! same event cannot both be recorded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::EntitlementStore;
use crate::domain::entitlement::{AccountEntitlement, EntitlementTransition};
use crate::domain::foundation::{AccountId, BillingEventId, DomainError};

/// How an event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOutcome {
    /// Entitlement was written.
    Applied,
    /// Valid, but the account already reflected it.
    Unchanged,
    /// Unknown event type.
    Ignored,
    /// Precondition failed; needs manual review.
    Conflict,
    /// Authentic but unusable payload; needs manual review.
    Rejected,
}

impl LedgerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOutcome::Applied => "applied",
            LedgerOutcome::Unchanged => "unchanged",
            LedgerOutcome::Ignored => "ignored",
            LedgerOutcome::Conflict => "conflict",
            LedgerOutcome::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "applied" => Some(LedgerOutcome::Applied),
            "unchanged" => Some(LedgerOutcome::Unchanged),
            "ignored" => Some(LedgerOutcome::Ignored),
            "conflict" => Some(LedgerOutcome::Conflict),
            "rejected" => Some(LedgerOutcome::Rejected),
            _ => None,
        }
    }
}

/// Ledger entry for one handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEventRecord {
    pub event_id: BillingEventId,
    pub event_type: String,
    pub account_id: Option<AccountId>,
    pub outcome: LedgerOutcome,
    /// Short digest of the entitlement state after handling.
    pub outcome_digest: String,
    /// Conflict or rejection reason, if any.
    pub detail: Option<String>,
    pub applied_at: DateTime<Utc>,
}

impl BillingEventRecord {
    pub fn new(
        event_id: BillingEventId,
        event_type: impl Into<String>,
        account_id: Option<AccountId>,
        outcome: LedgerOutcome,
        resulting: Option<&AccountEntitlement>,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            account_id,
            outcome,
            outcome_digest: resulting.map(AccountEntitlement::digest).unwrap_or_default(),
            detail: None,
            applied_at,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Result of attempting to record an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time this event id was seen.
    Inserted,
    /// Another delivery already recorded it.
    AlreadyExists,
}

/// Result of an atomic entitlement write plus ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    Committed(AccountEntitlement),
    /// The event id was already recorded; nothing was written.
    AlreadyRecorded,
}

#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    async fn contains(&self, event_id: &BillingEventId) -> Result<bool, DomainError>;

    async fn find(
        &self,
        event_id: &BillingEventId,
    ) -> Result<Option<BillingEventRecord>, DomainError>;

    /// Records an event that did not change any entitlement.
    async fn record(&self, record: &BillingEventRecord) -> Result<SaveResult, DomainError>;

    /// Deletes entries older than `cutoff`, returning how many were removed.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}

/// Store that can apply a transition and record its event as one unit.
///
/// Either both the entitlement write and the ledger entry persist, or
/// neither does. A ledger entry without its write would make every later
/// redelivery of that event a silent no-op.
#[async_trait]
pub trait ReconciliationStore: EntitlementStore + IdempotencyLedger {
    async fn commit(
        &self,
        transition: &EntitlementTransition,
        record: &BillingEventRecord,
    ) -> Result<CommitResult, DomainError>;
}
