//! Feature bitmask and the tier-to-mask table.
//!
//! Every gated feature owns exactly one bit. Tier masks are built from the
//! named feature list rather than raw constants, and `TierMasks::mask_for`
//! is the only place a plan is turned into a mask.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use super::PlanTier;
use crate::domain::foundation::ValidationError;

/// A single gated feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Reports,
    DataExport,
    Integrations,
    ApiAccess,
    PrioritySupport,
    CustomBranding,
    AuditLog,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Reports,
        Feature::DataExport,
        Feature::Integrations,
        Feature::ApiAccess,
        Feature::PrioritySupport,
        Feature::CustomBranding,
        Feature::AuditLog,
    ];

    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Reports => "reports",
            Feature::DataExport => "data_export",
            Feature::Integrations => "integrations",
            Feature::ApiAccess => "api_access",
            Feature::PrioritySupport => "priority_support",
            Feature::CustomBranding => "custom_branding",
            Feature::AuditLog => "audit_log",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Feature::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

/// Features granted by the basic tier unless overridden by configuration.
pub const BASIC_FEATURES: &[Feature] = &[Feature::Reports, Feature::DataExport];

/// Features granted by the premium tier unless overridden by configuration.
pub const PREMIUM_FEATURES: &[Feature] = &[
    Feature::Reports,
    Feature::DataExport,
    Feature::Integrations,
    Feature::ApiAccess,
    Feature::PrioritySupport,
    Feature::CustomBranding,
    Feature::AuditLog,
];

/// Unsigned bit field of granted features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureMask(u32);

impl FeatureMask {
    pub const EMPTY: FeatureMask = FeatureMask(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn from_features(features: &[Feature]) -> Self {
        features
            .iter()
            .fold(FeatureMask::EMPTY, |mask, f| mask | FeatureMask(f.bit()))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    pub const fn is_superset_of(self, other: FeatureMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Named features present in this mask, in table order.
    pub fn features(self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| self.contains(*f))
            .collect()
    }
}

impl BitOr for FeatureMask {
    type Output = FeatureMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        FeatureMask(self.0 | rhs.0)
    }
}

impl fmt::Display for FeatureMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Canonical mask per plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierMasks {
    basic: FeatureMask,
    premium: FeatureMask,
}

impl TierMasks {
    /// Builds a table, enforcing that both paid masks are non-empty and
    /// that premium grants everything basic does.
    pub fn new(basic: FeatureMask, premium: FeatureMask) -> Result<Self, ValidationError> {
        if basic.is_empty() {
            return Err(ValidationError::invalid_format(
                "basic_mask",
                "must grant at least one feature",
            ));
        }
        if premium.is_empty() {
            return Err(ValidationError::invalid_format(
                "premium_mask",
                "must grant at least one feature",
            ));
        }
        if !premium.is_superset_of(basic) {
            return Err(ValidationError::invalid_format(
                "premium_mask",
                "must include every feature of basic_mask",
            ));
        }
        Ok(Self { basic, premium })
    }

    /// The derivation function from plan to mask.
    pub fn mask_for(&self, plan: PlanTier) -> FeatureMask {
        match plan {
            PlanTier::None => FeatureMask::EMPTY,
            PlanTier::Basic => self.basic,
            PlanTier::Premium => self.premium,
        }
    }
}

impl Default for TierMasks {
    fn default() -> Self {
        Self {
            basic: FeatureMask::from_features(BASIC_FEATURES),
            premium: FeatureMask::from_features(PREMIUM_FEATURES),
        }
    }
}
