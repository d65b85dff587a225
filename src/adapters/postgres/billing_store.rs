//! PostgreSQL implementation of the entitlement store and idempotency ledger.
//!
//! `commit` runs the ledger insert and the entitlement upsert in one
//! transaction. The ledger's primary key decides which of two concurrent
//! deliveries of the same event wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::entitlement::{
    AccountEntitlement, EntitlementTransition, FeatureMask, PlanTier, ProviderRefs,
    SubscriptionStatus,
};
use crate::domain::foundation::{AccountId, BillingEventId, DomainError};
use crate::ports::{
    BillingEventRecord, CommitResult, EntitlementStore, IdempotencyLedger, LedgerOutcome,
    ReconciliationStore, SaveResult,
};

pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    account_id: String,
    plan: String,
    feature_mask: i64,
    status: String,
    customer_ref: Option<String>,
    subscription_ref: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for AccountEntitlement {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let account_id = AccountId::new(row.account_id)
            .map_err(|e| DomainError::database(format!("Invalid account_id: {}", e)))?;
        let plan: PlanTier = row
            .plan
            .parse()
            .map_err(|_| DomainError::database(format!("Invalid plan value: {}", row.plan)))?;
        let status = SubscriptionStatus::parse(&row.status).ok_or_else(|| {
            DomainError::database(format!("Invalid status value: {}", row.status))
        })?;
        let bits = u32::try_from(row.feature_mask).map_err(|_| {
            DomainError::database(format!("Invalid feature_mask: {}", row.feature_mask))
        })?;

        Ok(AccountEntitlement {
            account_id,
            plan,
            feature_mask: FeatureMask::from_bits(bits),
            status,
            updated_at: row.updated_at,
            refs: ProviderRefs::new(row.customer_ref, row.subscription_ref),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    event_id: String,
    event_type: String,
    account_id: Option<String>,
    outcome: String,
    outcome_digest: String,
    detail: Option<String>,
    applied_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for BillingEventRecord {
    type Error = DomainError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let event_id = BillingEventId::new(row.event_id)
            .map_err(|e| DomainError::database(format!("Invalid event_id: {}", e)))?;
        let account_id = row
            .account_id
            .map(AccountId::new)
            .transpose()
            .map_err(|e| DomainError::database(format!("Invalid account_id: {}", e)))?;
        let outcome = LedgerOutcome::parse(&row.outcome).ok_or_else(|| {
            DomainError::database(format!("Invalid outcome value: {}", row.outcome))
        })?;

        Ok(BillingEventRecord {
            event_id,
            event_type: row.event_type,
            account_id,
            outcome,
            outcome_digest: row.outcome_digest,
            detail: row.detail,
            applied_at: row.applied_at,
        })
    }
}

const UPSERT_ENTITLEMENT: &str = r#"
    INSERT INTO account_entitlements (
        account_id, plan, feature_mask, status, customer_ref, subscription_ref, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (account_id) DO UPDATE SET
        plan = EXCLUDED.plan,
        feature_mask = EXCLUDED.feature_mask,
        status = EXCLUDED.status,
        customer_ref = EXCLUDED.customer_ref,
        subscription_ref = EXCLUDED.subscription_ref,
        updated_at = EXCLUDED.updated_at
    RETURNING account_id, plan, feature_mask, status, customer_ref, subscription_ref, updated_at
"#;

const INSERT_LEDGER: &str = r#"
    INSERT INTO billing_event_ledger (
        event_id, event_type, account_id, outcome, outcome_digest, detail, applied_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (event_id) DO NOTHING
"#;

async fn upsert_entitlement(
    tx: &mut Transaction<'_, Postgres>,
    transition: &EntitlementTransition,
) -> Result<AccountEntitlement, DomainError> {
    let row = sqlx::query_as::<_, EntitlementRow>(UPSERT_ENTITLEMENT)
        .bind(transition.account_id.as_str())
        .bind(transition.plan.as_str())
        .bind(i64::from(transition.feature_mask.bits()))
        .bind(transition.status.as_str())
        .bind(&transition.refs.customer_ref)
        .bind(&transition.refs.subscription_ref)
        .bind(transition.applied_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to write entitlement: {}", e)))?;

    AccountEntitlement::try_from(row)
}

async fn insert_ledger(
    tx: &mut Transaction<'_, Postgres>,
    record: &BillingEventRecord,
) -> Result<SaveResult, DomainError> {
    let result = sqlx::query(INSERT_LEDGER)
        .bind(record.event_id.as_str())
        .bind(&record.event_type)
        .bind(record.account_id.as_ref().map(AccountId::as_str))
        .bind(record.outcome.as_str())
        .bind(&record.outcome_digest)
        .bind(&record.detail)
        .bind(record.applied_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to record billing event: {}", e)))?;

    if result.rows_affected() == 0 {
        Ok(SaveResult::AlreadyExists)
    } else {
        Ok(SaveResult::Inserted)
    }
}

impl PostgresBillingStore {
    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to start transaction: {}", e)))
    }
}

async fn finish(tx: Transaction<'_, Postgres>) -> Result<(), DomainError> {
    tx.commit()
        .await
        .map_err(|e| DomainError::database(format!("Failed to commit transaction: {}", e)))
}

#[async_trait]
impl EntitlementStore for PostgresBillingStore {
    async fn get(&self, account_id: &AccountId) -> Result<AccountEntitlement, DomainError> {
        let row = sqlx::query_as::<_, EntitlementRow>(
            r#"
            SELECT account_id, plan, feature_mask, status, customer_ref, subscription_ref, updated_at
            FROM account_entitlements
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load entitlement: {}", e)))?;

        match row {
            Some(row) => AccountEntitlement::try_from(row),
            None => Ok(AccountEntitlement::inactive(account_id.clone(), Utc::now())),
        }
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<AccountId>, DomainError> {
        let account_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT account_id
            FROM account_entitlements
            WHERE subscription_ref = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(subscription_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to resolve subscription: {}", e)))?;

        account_id
            .map(AccountId::new)
            .transpose()
            .map_err(|e| DomainError::database(format!("Invalid account_id: {}", e)))
    }

    async fn apply_transition(
        &self,
        transition: &EntitlementTransition,
    ) -> Result<AccountEntitlement, DomainError> {
        let mut tx = self.begin().await?;
        let next = upsert_entitlement(&mut tx, transition).await?;
        finish(tx).await?;
        Ok(next)
    }
}

#[async_trait]
impl IdempotencyLedger for PostgresBillingStore {
    async fn contains(&self, event_id: &BillingEventId) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM billing_event_ledger WHERE event_id = $1)",
        )
        .bind(event_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check ledger: {}", e)))?;

        Ok(exists)
    }

    async fn find(
        &self,
        event_id: &BillingEventId,
    ) -> Result<Option<BillingEventRecord>, DomainError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT event_id, event_type, account_id, outcome, outcome_digest, detail, applied_at
            FROM billing_event_ledger
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load ledger entry: {}", e)))?;

        row.map(BillingEventRecord::try_from).transpose()
    }

    async fn record(&self, record: &BillingEventRecord) -> Result<SaveResult, DomainError> {
        let mut tx = self.begin().await?;
        let result = insert_ledger(&mut tx, record).await?;
        finish(tx).await?;
        Ok(result)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM billing_event_ledger WHERE applied_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to prune ledger: {}", e)))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ReconciliationStore for PostgresBillingStore {
    async fn commit(
        &self,
        transition: &EntitlementTransition,
        record: &BillingEventRecord,
    ) -> Result<CommitResult, DomainError> {
        let mut tx = self.begin().await?;

        // Ledger first: a duplicate stops here without touching the account
        if insert_ledger(&mut tx, record).await? == SaveResult::AlreadyExists {
            tx.rollback()
                .await
                .map_err(|e| DomainError::database(format!("Failed to roll back: {}", e)))?;
            return Ok(CommitResult::AlreadyRecorded);
        }

        let next = upsert_entitlement(&mut tx, transition).await?;
        finish(tx).await?;
        Ok(CommitResult::Committed(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(plan: &str, status: &str, mask: i64) -> EntitlementRow {
        EntitlementRow {
            account_id: "acc1".to_string(),
            plan: plan.to_string(),
            feature_mask: mask,
            status: status.to_string(),
            customer_ref: Some("cus_1".to_string()),
            subscription_ref: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn entitlement_row_converts() {
        let ent = AccountEntitlement::try_from(row("premium", "past_due", 0x7f)).unwrap();
        assert_eq!(ent.plan, PlanTier::Premium);
        assert_eq!(ent.status, SubscriptionStatus::PastDue);
        assert_eq!(ent.feature_mask.bits(), 0x7f);
        assert_eq!(ent.refs.customer_ref.as_deref(), Some("cus_1"));
    }

    #[test]
    fn entitlement_row_rejects_unknown_status() {
        assert!(AccountEntitlement::try_from(row("basic", "expired", 3)).is_err());
    }

    #[test]
    fn entitlement_row_rejects_negative_mask() {
        assert!(AccountEntitlement::try_from(row("basic", "active", -1)).is_err());
    }

    #[test]
    fn ledger_row_converts() {
        let record = BillingEventRecord::try_from(LedgerRow {
            event_id: "evt_1".to_string(),
            event_type: "invoice.paid".to_string(),
            account_id: None,
            outcome: "conflict".to_string(),
            outcome_digest: "abcd".to_string(),
            detail: Some("payment succeeded while inactive".to_string()),
            applied_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(record.outcome, LedgerOutcome::Conflict);
        assert!(record.account_id.is_none());
    }
}
