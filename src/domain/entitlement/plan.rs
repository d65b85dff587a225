//! Plan tier definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Plan an account is entitled to.
///
/// `None` is the unpaid state; the two paid tiers are the only values a
/// checkout may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    None,
    Basic,
    Premium,
}

impl PlanTier {
    /// Tiers that can be purchased through checkout.
    pub const PAID: [PlanTier; 2] = [PlanTier::Basic, PlanTier::Premium];

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::None => "none",
            PlanTier::Basic => "basic",
            PlanTier::Premium => "premium",
        }
    }

    /// Parses a tier requested for purchase, rejecting `none`.
    pub fn parse_paid(value: &str) -> Result<Self, ValidationError> {
        let tier: PlanTier = value.parse()?;
        if !tier.is_paid() {
            return Err(ValidationError::invalid_format(
                "tier",
                "only basic and premium can be purchased",
            ));
        }
        Ok(tier)
    }
}

impl FromStr for PlanTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(PlanTier::None),
            "basic" => Ok(PlanTier::Basic),
            "premium" => Ok(PlanTier::Premium),
            other => Err(ValidationError::invalid_format(
                "tier",
                format!("unknown tier '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_not_paid() {
        assert!(!PlanTier::None.is_paid());
        assert!(PlanTier::PAID.iter().all(PlanTier::is_paid));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Premium".parse::<PlanTier>().unwrap(), PlanTier::Premium);
        assert_eq!(" basic ".parse::<PlanTier>().unwrap(), PlanTier::Basic);
    }

    #[test]
    fn parse_paid_rejects_none_and_unknown() {
        assert!(PlanTier::parse_paid("none").is_err());
        assert!(PlanTier::parse_paid("enterprise").is_err());
        assert_eq!(PlanTier::parse_paid("basic").unwrap(), PlanTier::Basic);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PlanTier::Premium).unwrap(),
            "\"premium\""
        );
    }
}
