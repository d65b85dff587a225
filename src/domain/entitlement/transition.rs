//! Pure reconciliation of billing signals into entitlement transitions.
//!
//! No I/O happens here: the caller supplies the current state, the signal
//! and the clock, and persists whatever comes back.

use chrono::{DateTime, Utc};

use super::{
    AccountEntitlement, EntitlementTransition, PlanTier, ProviderRefs, SubscriptionStatus,
    TierMasks,
};

/// What a billing event means for an account, stripped of wire details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingSignal {
    CheckoutCompleted { tier: PlanTier, refs: ProviderRefs },
    PlanChanged { tier: PlanTier, refs: ProviderRefs },
    PaymentSucceeded { refs: ProviderRefs },
    PaymentFailed { refs: ProviderRefs },
    SubscriptionCancelled { refs: ProviderRefs },
}

impl BillingSignal {
    pub fn name(&self) -> &'static str {
        match self {
            BillingSignal::CheckoutCompleted { .. } => "checkout_completed",
            BillingSignal::PlanChanged { .. } => "plan_changed",
            BillingSignal::PaymentSucceeded { .. } => "payment_succeeded",
            BillingSignal::PaymentFailed { .. } => "payment_failed",
            BillingSignal::SubscriptionCancelled { .. } => "subscription_cancelled",
        }
    }

    pub fn refs(&self) -> &ProviderRefs {
        match self {
            BillingSignal::CheckoutCompleted { refs, .. }
            | BillingSignal::PlanChanged { refs, .. }
            | BillingSignal::PaymentSucceeded { refs }
            | BillingSignal::PaymentFailed { refs }
            | BillingSignal::SubscriptionCancelled { refs } => refs,
        }
    }
}

/// Result of evaluating a signal against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The account must move to a new state.
    Apply(EntitlementTransition),
    /// The signal is valid but the account already reflects it.
    Unchanged,
    /// The precondition for the signal does not hold.
    Conflict { reason: String },
}

/// Computes the effect of `signal` on `current`.
pub fn reconcile(
    current: &AccountEntitlement,
    signal: &BillingSignal,
    masks: &TierMasks,
    now: DateTime<Utc>,
) -> Reconciliation {
    use SubscriptionStatus::*;

    let target = |plan: PlanTier, status: SubscriptionStatus, refs: &ProviderRefs| {
        let feature_mask = if status.grants_features() {
            masks.mask_for(plan)
        } else {
            masks.mask_for(PlanTier::None)
        };
        EntitlementTransition {
            account_id: current.account_id.clone(),
            plan,
            feature_mask,
            status,
            refs: current.refs.merged_with(refs),
            applied_at: now,
        }
    };

    let transition = match signal {
        BillingSignal::CheckoutCompleted { tier, refs } => {
            if !tier.is_paid() {
                return conflict(format!("checkout completed for unpaid tier '{}'", tier));
            }
            let resurrects_cancelled = current.status == Cancelled
                && refs.subscription_ref.is_some()
                && current.refs.subscription_ref == refs.subscription_ref;
            if resurrects_cancelled {
                return conflict(
                    "checkout completed for a subscription already cancelled on this account",
                );
            }
            target(*tier, Active, refs)
        }
        BillingSignal::PlanChanged { tier, refs } => match current.status {
            Active | PastDue if tier.is_paid() => target(*tier, Active, refs),
            Active | PastDue => {
                return conflict(format!("plan change to unpaid tier '{}'", tier));
            }
            other => return conflict(format!("plan change while {}", other)),
        },
        BillingSignal::PaymentSucceeded { refs } => match current.status {
            Active | PastDue => target(current.plan, Active, refs),
            other => return conflict(format!("payment succeeded while {}", other)),
        },
        BillingSignal::PaymentFailed { refs } => match current.status {
            Active | PastDue => target(current.plan, PastDue, refs),
            other => return conflict(format!("payment failed while {}", other)),
        },
        BillingSignal::SubscriptionCancelled { refs } => target(PlanTier::None, Cancelled, refs),
    };

    if !current.status.can_transition_to(&transition.status) {
        return conflict(format!(
            "{} cannot move {} to {}",
            signal.name(),
            current.status,
            transition.status
        ));
    }

    if current.is_same_state(&transition) {
        Reconciliation::Unchanged
    } else {
        Reconciliation::Apply(transition)
    }
}

fn conflict(reason: impl Into<String>) -> Reconciliation {
    Reconciliation::Conflict {
        reason: reason.into(),
    }
}
