//! Webhook signature verification.
//!
//! The signature header is `t=<unix seconds>,v1=<hex>` where the hex value is
//! HMAC-SHA256 over `"{t}.{raw body}"` with the shared signing secret. More
//! than one `v1` entry may be present while a secret is being rotated.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::event::{BillingEvent, MalformedEvent};
use super::webhook_errors::WebhookError;
use crate::domain::foundation::BillingEventId;

pub const DEFAULT_REPLAY_WINDOW_SECS: i64 = 300;
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 60;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<ts>,v1=<hex>[,v1=<hex>...]`.
    ///
    /// Any malformation is an authenticity failure.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(WebhookError::InvalidSignature)?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| WebhookError::InvalidSignature)?);
                }
                "v1" => {
                    v1_signatures
                        .push(hex::decode(value).map_err(|_| WebhookError::InvalidSignature)?);
                }
                _ => {
                    // Other schemes (v0, future versions) are not trusted
                }
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::InvalidSignature)?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::InvalidSignature);
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// A delivery that passed every authenticity check.
#[derive(Debug, Clone)]
pub enum VerifiedDelivery {
    Event(BillingEvent),
    /// Signed by the provider but unusable. Redelivery cannot fix it.
    Malformed(MalformedEvent),
}

impl VerifiedDelivery {
    pub fn event_id(&self) -> &BillingEventId {
        match self {
            VerifiedDelivery::Event(event) => &event.event_id,
            VerifiedDelivery::Malformed(malformed) => &malformed.event_id,
        }
    }
}

/// Validates inbound webhook payloads before they reach business logic.
///
/// Never touches state; safe to share across concurrent requests.
pub struct WebhookVerifier {
    secret: SecretString,
    replay_window_secs: i64,
    max_clock_skew_secs: i64,
    max_payload_bytes: usize,
    require_livemode: bool,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS,
            max_clock_skew_secs: DEFAULT_MAX_CLOCK_SKEW_SECS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            require_livemode: false,
        }
    }

    pub fn with_replay_window(mut self, secs: i64) -> Self {
        self.replay_window_secs = secs;
        self
    }

    pub fn with_max_clock_skew(mut self, secs: i64) -> Self {
        self.max_clock_skew_secs = secs;
        self
    }

    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn with_require_livemode(mut self, required: bool) -> Self {
        self.require_livemode = required;
        self
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Verifies the payload against the current clock and parses it.
    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<VerifiedDelivery, WebhookError> {
        self.verify_at(payload, signature_header, Utc::now().timestamp())
    }

    /// Verifies the payload as of `now` (Unix seconds).
    ///
    /// Order matters: size is checked before any signature work, and the
    /// body is only parsed once the signature has matched. Only the
    /// authenticity gate produces errors.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<VerifiedDelivery, WebhookError> {
        if payload.len() > self.max_payload_bytes {
            return Err(WebhookError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_bytes,
            });
        }

        let header = SignatureHeader::parse(signature_header)?;
        self.validate_timestamp(header.timestamp, now)?;

        let expected = compute_signature(self.secret.expose_secret(), header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        let event = match BillingEvent::from_authentic(payload) {
            Ok(event) => event,
            Err(malformed) => return Ok(VerifiedDelivery::Malformed(malformed)),
        };

        if self.require_livemode && event.livemode != Some(true) {
            return Ok(VerifiedDelivery::Malformed(
                event.malformed("test-mode event while livemode is required"),
            ));
        }

        Ok(VerifiedDelivery::Event(event))
    }

    /// The header timestamp is unauthenticated at this point, so the age is
    /// computed without overflow.
    fn validate_timestamp(&self, timestamp: i64, now: i64) -> Result<(), WebhookError> {
        let age = now.checked_sub(timestamp).ok_or(WebhookError::StalePayload {
            age_secs: if timestamp < 0 { i64::MAX } else { i64::MIN },
        })?;
        if age > self.replay_window_secs || age < -self.max_clock_skew_secs {
            return Err(WebhookError::StalePayload { age_secs: age });
        }
        Ok(())
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Builds a signature header for `payload`, as the provider would.
///
/// Used by senders in tests and local tooling.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    match compute_signature(secret, timestamp, payload) {
        Ok(sig) => format!("t={},v1={}", timestamp, hex::encode(sig)),
        Err(_) => format!("t={}", timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const NOW: i64 = 1_700_000_000;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    fn payload() -> Vec<u8> {
        br#"{"event_id":"evt_1","event_type":"invoice.paid","data":{"account_id":"acc1"}}"#
            .to_vec()
    }

    fn expect_event(delivery: VerifiedDelivery) -> BillingEvent {
        match delivery {
            VerifiedDelivery::Event(event) => event,
            other => panic!("expected usable event, got {:?}", other),
        }
    }

    fn expect_malformed(delivery: VerifiedDelivery) -> MalformedEvent {
        match delivery {
            VerifiedDelivery::Malformed(malformed) => malformed,
            other => panic!("expected malformed event, got {:?}", other),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Header Parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_collects_every_v1_signature() {
        let header = format!("t=123,v1={},v1={}", "a".repeat(64), "b".repeat(64));
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.timestamp, 123);
        assert_eq!(parsed.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_header_ignores_other_schemes() {
        let header = format!("t=123,v0={},v1={}", "c".repeat(64), "a".repeat(64));
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.v1_signatures.len(), 1);
    }

    #[test]
    fn parse_header_without_v1_fails_closed() {
        assert!(matches!(
            SignatureHeader::parse("t=123,v0=abcd"),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn parse_header_rejects_garbage() {
        for header in ["", "garbage", "t=abc,v1=00", "t=1,v1=zz"] {
            assert!(SignatureHeader::parse(header).is_err(), "{header}");
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_parses_event() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, NOW, &body);

        let event = expect_event(verifier().verify_at(&body, &header, NOW).unwrap());

        assert_eq!(event.event_id.as_str(), "evt_1");
    }

    #[test]
    fn altered_byte_is_rejected() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, NOW, &body);

        let mut tampered = body.clone();
        let last = tampered.len() - 3;
        tampered[last] ^= 0x01;

        assert!(matches!(
            verifier().verify_at(&tampered, &header, NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = payload();
        let header = sign_payload("whsec_other", NOW, &body);

        assert!(matches!(
            verifier().verify_at(&body, &header, NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn rotated_secret_matches_any_v1_entry() {
        let body = payload();
        let good = sign_payload(TEST_SECRET, NOW, &body);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "0".repeat(64), good_sig);

        assert!(verifier().verify_at(&body, &header, NOW).is_ok());
    }

    #[test]
    fn payload_older_than_replay_window_is_stale() {
        let body = payload();
        let signed_at = NOW - DEFAULT_REPLAY_WINDOW_SECS - 1;
        let header = sign_payload(TEST_SECRET, signed_at, &body);

        assert!(matches!(
            verifier().verify_at(&body, &header, NOW),
            Err(WebhookError::StalePayload { .. })
        ));
    }

    #[test]
    fn payload_at_window_edge_is_accepted() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, NOW - DEFAULT_REPLAY_WINDOW_SECS, &body);

        assert!(verifier().verify_at(&body, &header, NOW).is_ok());
    }

    #[test]
    fn payload_from_the_future_beyond_skew_is_stale() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, NOW + DEFAULT_MAX_CLOCK_SKEW_SECS + 5, &body);

        assert!(matches!(
            verifier().verify_at(&body, &header, NOW),
            Err(WebhookError::StalePayload { .. })
        ));
    }

    #[test]
    fn extreme_header_timestamps_are_stale_not_panics() {
        let body = payload();

        for timestamp in [i64::MIN, i64::MAX, i64::MIN + 1] {
            let header = format!("t={},v1={}", timestamp, "0".repeat(64));
            assert!(
                matches!(
                    verifier().verify_at(&body, &header, NOW),
                    Err(WebhookError::StalePayload { .. })
                ),
                "{timestamp}"
            );
        }
    }

    #[test]
    fn extreme_clock_values_are_stale_not_panics() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, NOW, &body);

        for now in [i64::MIN, i64::MAX] {
            assert!(matches!(
                verifier().verify_at(&body, &header, now),
                Err(WebhookError::StalePayload { .. })
            ));
        }
    }

    #[test]
    fn oversized_payload_is_rejected_before_signature_check() {
        let verifier = verifier().with_max_payload_bytes(16);
        // Header is garbage: size must be checked first
        let result = verifier.verify_at(&payload(), "not-a-header", NOW);

        assert!(matches!(
            result,
            Err(WebhookError::PayloadTooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn authentic_non_json_is_malformed() {
        let body = b"not json".to_vec();
        let header = sign_payload(TEST_SECRET, NOW, &body);

        let malformed = expect_malformed(verifier().verify_at(&body, &header, NOW).unwrap());

        assert!(malformed.event_id.as_str().starts_with("sha256:"));
    }

    #[test]
    fn livemode_guard_rejects_test_events() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, NOW, &body);

        let delivery = verifier()
            .with_require_livemode(true)
            .verify_at(&body, &header, NOW)
            .unwrap();

        let malformed = expect_malformed(delivery);
        assert_eq!(malformed.event_id.as_str(), "evt_1");
        assert!(malformed.reason.contains("livemode"));
    }
}
