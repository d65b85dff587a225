//! Webhook ingestion errors and acknowledgments.
//!
//! Errors map to a status code that drives the provider's retry policy:
//! 4xx stops redelivery, 5xx asks for it. Only the authenticity gate and
//! transient failures are errors. Anything the provider really sent is
//! acknowledged with 200, including events that cannot be used.

use axum::http::StatusCode;
use thiserror::Error;

/// Failures at the ingestion boundary.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature missing, malformed, or not produced with our secret.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature timestamp outside the replay window or too far in the future.
    #[error("Stale payload: signed {age_secs}s ago")]
    StalePayload { age_secs: i64 },

    /// Body exceeds the configured limit. No signature work was done.
    #[error("Payload too large: {size} bytes exceeds {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// No account could be resolved for the event yet.
    #[error("Account not resolved for event")]
    AccountNotResolved,

    /// Persistence failed; nothing was recorded.
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::StorageFailure(_)
                | WebhookError::AccountNotResolved // Checkout confirmation may still be in flight
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::StalePayload { .. } => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            WebhookError::AccountNotResolved | WebhookError::StorageFailure(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Stable code used in logs and response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::StalePayload { .. } => "STALE_PAYLOAD",
            WebhookError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            WebhookError::AccountNotResolved => "ACCOUNT_NOT_RESOLVED",
            WebhookError::StorageFailure(_) => "STORAGE_FAILURE",
        }
    }
}

/// Successful handling of an authentic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Entitlement changed and the event was recorded.
    Applied,
    /// Event was valid but the account already reflected it.
    Unchanged,
    /// Event id was already in the ledger.
    Duplicate,
    /// Event type is not one we act on.
    UnknownEventType,
    /// Precondition failed; left for manual review.
    TransitionConflict,
    /// Authentic but unusable event; recorded for manual review.
    Rejected,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Unchanged => "unchanged",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::UnknownEventType => "unknown_event_type",
            WebhookOutcome::TransitionConflict => "transition_conflict",
            WebhookOutcome::Rejected => "rejected",
        }
    }

    /// Every outcome is acknowledged so the provider stops redelivering.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Status Code Mapping
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn authenticity_failures_are_unauthorized() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::StalePayload { age_secs: 900 }.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn oversized_payload_is_413() {
        let err = WebhookError::PayloadTooLarge {
            size: 70_000,
            limit: 65_536,
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn retryable_failures_are_503() {
        for err in [
            WebhookError::StorageFailure("pool exhausted".into()),
            WebhookError::AccountNotResolved,
        ] {
            assert!(err.is_retryable());
            assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn gate_failures_are_not_retryable() {
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::StalePayload { age_secs: 301 }.is_retryable());
        assert!(!WebhookError::PayloadTooLarge { size: 2, limit: 1 }.is_retryable());
    }

    #[test]
    fn every_outcome_is_acknowledged() {
        for outcome in [
            WebhookOutcome::Applied,
            WebhookOutcome::Unchanged,
            WebhookOutcome::Duplicate,
            WebhookOutcome::UnknownEventType,
            WebhookOutcome::TransitionConflict,
            WebhookOutcome::Rejected,
        ] {
            assert_eq!(outcome.status_code(), StatusCode::OK);
        }
    }

    #[test]
    fn stale_payload_reports_age() {
        let err = WebhookError::StalePayload { age_secs: 420 };
        assert_eq!(err.to_string(), "Stale payload: signed 420s ago");
    }
}
