//! Billing domain - inbound provider events and their verification.

mod event;
mod webhook_errors;
mod webhook_verifier;

pub use event::{BillingEvent, BillingEventData, BillingEventType, MalformedEvent};
pub use webhook_errors::{WebhookError, WebhookOutcome};
pub use webhook_verifier::{
    sign_payload, SignatureHeader, VerifiedDelivery, WebhookVerifier, DEFAULT_MAX_CLOCK_SKEW_SECS,
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_REPLAY_WINDOW_SECS,
};
