//! HandleBillingWebhookHandler - ingestion boundary for provider webhooks.
//!
//! Verification is stateless and runs before anything touches storage; a
//! payload that fails it never reaches the reconciliation engine. A signed
//! payload that cannot be used is recorded and acknowledged instead of
//! refused, since the provider would otherwise redeliver it indefinitely.

use std::sync::Arc;

use super::ReconciliationEngine;
use crate::domain::billing::{VerifiedDelivery, WebhookError, WebhookOutcome, WebhookVerifier};

#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw body exactly as received; the signature covers these bytes.
    pub payload: Vec<u8>,
    pub signature: Option<String>,
}

pub struct HandleBillingWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    engine: Arc<ReconciliationEngine>,
}

impl HandleBillingWebhookHandler {
    pub fn new(verifier: Arc<WebhookVerifier>, engine: Arc<ReconciliationEngine>) -> Self {
        Self { verifier, engine }
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = cmd.signature.as_deref().unwrap_or_default();

        let delivery = self.verifier.verify(&cmd.payload, signature).map_err(|e| {
            tracing::warn!(
                code = e.code(),
                payload_bytes = cmd.payload.len(),
                error = %e,
                "Rejected billing webhook"
            );
            e
        })?;

        let event_id = delivery.event_id().clone();
        let (event_type, result) = match &delivery {
            VerifiedDelivery::Event(event) => (
                event.event_type.as_str().to_string(),
                self.engine.apply(event).await,
            ),
            VerifiedDelivery::Malformed(malformed) => (
                malformed.event_type.clone(),
                self.engine.reject(malformed).await,
            ),
        };

        match result {
            Ok(outcome) => {
                tracing::info!(
                    event_id = %event_id,
                    event_type = %event_type,
                    outcome = outcome.as_str(),
                    "Billing webhook acknowledged"
                );
                Ok(outcome)
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        event_id = %event_id,
                        event_type = %event_type,
                        code = e.code(),
                        error = %e,
                        "Billing webhook failed; provider will redeliver"
                    );
                } else {
                    tracing::warn!(
                        event_id = %event_id,
                        event_type = %event_type,
                        code = e.code(),
                        error = %e,
                        "Billing webhook rejected after verification"
                    );
                }
                Err(e)
            }
        }
    }
}
