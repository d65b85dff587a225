//! Strongly-typed identifier value objects.
//!
//! Both identifiers are opaque strings: account ids come from the host
//! application and event ids are assigned by the billing provider.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

const MAX_ID_LEN: usize = 255;

fn validate_opaque(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::too_long(field, MAX_ID_LEN));
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::invalid_format(
            field,
            "control characters are not allowed",
        ));
    }
    Ok(())
}

/// Identifier of a customer account holding entitlements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_opaque("account_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-assigned billing event identifier (the idempotency key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingEventId(String);

impl BillingEventId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_opaque("event_id", &value)?;
        Ok(Self(value))
    }

    /// Stand-in key for a signed body that carried no usable id.
    pub fn from_body_digest(hex_digest: &str) -> Self {
        Self(format!("sha256:{}", hex_digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BillingEventId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BillingEventId> for String {
    fn from(id: BillingEventId) -> Self {
        id.0
    }
}

impl fmt::Display for BillingEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_accepts_opaque_strings() {
        let id = AccountId::new("acc1").unwrap();
        assert_eq!(id.as_str(), "acc1");
        assert_eq!(id.to_string(), "acc1");
    }

    #[test]
    fn account_id_rejects_blank() {
        assert!(matches!(
            AccountId::new("   "),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn account_id_rejects_oversized() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(matches!(
            AccountId::new(long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn event_id_rejects_control_characters() {
        assert!(BillingEventId::new("evt_\n1").is_err());
    }

    #[test]
    fn event_id_deserializes_through_validation() {
        let ok: BillingEventId = serde_json::from_str("\"evt_123\"").unwrap();
        assert_eq!(ok.as_str(), "evt_123");

        let bad: Result<BillingEventId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
