//! Billing event envelope as delivered by the provider.
//!
//! Only the fields reconciliation needs are captured; everything else in
//! the body is ignored.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::entitlement::{BillingSignal, PlanTier, ProviderRefs};
use crate::domain::foundation::{AccountId, BillingEventId};

/// Verified inbound billing event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Provider-assigned idempotency key.
    #[serde(alias = "id")]
    pub event_id: BillingEventId,

    #[serde(alias = "type")]
    pub event_type: BillingEventType,

    /// Provider-side creation time (Unix seconds), informational only.
    #[serde(default)]
    pub created: Option<i64>,

    #[serde(default)]
    pub livemode: Option<bool>,

    pub data: BillingEventData,
}

/// Event payload relevant to entitlements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingEventData {
    #[serde(default, alias = "client_reference_id")]
    pub account_id: Option<AccountId>,

    #[serde(default)]
    pub tier: Option<PlanTier>,

    #[serde(default, alias = "customer")]
    pub customer_ref: Option<String>,

    #[serde(default, alias = "subscription")]
    pub subscription_ref: Option<String>,
}

impl BillingEventData {
    pub fn refs(&self) -> ProviderRefs {
        ProviderRefs::new(self.customer_ref.clone(), self.subscription_ref.clone())
    }
}

/// Event types we reconcile, keyed by their wire names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BillingEventType {
    CheckoutCompleted,
    SubscriptionUpdated,
    PaymentSucceeded,
    PaymentFailed,
    SubscriptionDeleted,
    /// Anything the provider adds later; acknowledged without effect.
    Unknown(String),
}

impl BillingEventType {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "invoice.payment_succeeded" | "invoice.paid" => Self::PaymentSucceeded,
            "invoice.payment_failed" => Self::PaymentFailed,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutCompleted => "checkout.session.completed",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::PaymentSucceeded => "invoice.payment_succeeded",
            Self::PaymentFailed => "invoice.payment_failed",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for BillingEventType {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<BillingEventType> for String {
    fn from(value: BillingEventType) -> Self {
        value.as_str().to_string()
    }
}

impl BillingEvent {
    /// Parses a body whose signature has already been verified.
    ///
    /// A body that does not deserialize still yields a [`MalformedEvent`]
    /// with the best identity that can be recovered, so it can be recorded.
    pub fn from_authentic(payload: &[u8]) -> Result<Self, MalformedEvent> {
        serde_json::from_slice(payload)
            .map_err(|e| EnvelopeIdentity::recover(payload).into_malformed(payload, e.to_string()))
    }

    /// Translates the event into a domain signal.
    ///
    /// Returns `Ok(None)` for unknown event types.
    pub fn signal(&self) -> Result<Option<BillingSignal>, MalformedEvent> {
        let refs = self.data.refs();
        let signal = match &self.event_type {
            BillingEventType::CheckoutCompleted => BillingSignal::CheckoutCompleted {
                tier: self.required_tier()?,
                refs,
            },
            BillingEventType::SubscriptionUpdated => BillingSignal::PlanChanged {
                tier: self.required_tier()?,
                refs,
            },
            BillingEventType::PaymentSucceeded => BillingSignal::PaymentSucceeded { refs },
            BillingEventType::PaymentFailed => BillingSignal::PaymentFailed { refs },
            BillingEventType::SubscriptionDeleted => BillingSignal::SubscriptionCancelled { refs },
            BillingEventType::Unknown(_) => return Ok(None),
        };
        Ok(Some(signal))
    }

    /// Marks this event as unusable for `reason`.
    pub fn malformed(&self, reason: impl Into<String>) -> MalformedEvent {
        MalformedEvent {
            event_id: self.event_id.clone(),
            event_type: self.event_type.as_str().to_string(),
            account_id: self.data.account_id.clone(),
            reason: reason.into(),
        }
    }

    fn required_tier(&self) -> Result<PlanTier, MalformedEvent> {
        match self.data.tier {
            Some(tier) if tier.is_paid() => Ok(tier),
            Some(tier) => Err(self.malformed(format!(
                "{} carries unpaid tier '{}'",
                self.event_type.as_str(),
                tier
            ))),
            None => Err(self.malformed(format!(
                "{} is missing data.tier",
                self.event_type.as_str()
            ))),
        }
    }
}

/// Authentic delivery that can never be reconciled.
///
/// Redelivery cannot fix it, so it is recorded and acknowledged rather
/// than refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed billing event {event_id}: {reason}")]
pub struct MalformedEvent {
    pub event_id: BillingEventId,
    pub event_type: String,
    pub account_id: Option<AccountId>,
    pub reason: String,
}

/// Whatever identifies a delivery whose full envelope did not parse.
#[derive(Debug, Default, Deserialize)]
struct EnvelopeIdentity {
    #[serde(default, alias = "id")]
    event_id: Option<String>,
    #[serde(default, alias = "type")]
    event_type: Option<String>,
    #[serde(default)]
    data: Option<IdentityData>,
}

#[derive(Debug, Default, Deserialize)]
struct IdentityData {
    #[serde(default, alias = "client_reference_id")]
    account_id: Option<String>,
}

impl EnvelopeIdentity {
    fn recover(payload: &[u8]) -> Self {
        serde_json::from_slice(payload).unwrap_or_default()
    }

    /// Falls back to a body digest so identical redeliveries share one id.
    fn into_malformed(self, payload: &[u8], reason: String) -> MalformedEvent {
        let event_id = self
            .event_id
            .and_then(|id| BillingEventId::new(id).ok())
            .unwrap_or_else(|| BillingEventId::from_body_digest(&hex::encode(Sha256::digest(payload))));
        MalformedEvent {
            event_id,
            event_type: self.event_type.unwrap_or_else(|| "unknown".to_string()),
            account_id: self
                .data
                .and_then(|data| data.account_id)
                .and_then(|id| AccountId::new(id).ok()),
            reason,
        }
    }
}
