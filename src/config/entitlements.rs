//! Per-tier feature masks

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::entitlement::{
    Feature, FeatureMask, TierMasks, BASIC_FEATURES, PREMIUM_FEATURES,
};

/// Feature masks granted by each paid tier.
///
/// Bits follow [`Feature::bit`]. The defaults come from the named feature
/// table, so only deployments that sell a different bundle set these.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EntitlementsConfig {
    #[serde(default = "default_basic_mask")]
    pub basic_mask: u32,

    #[serde(default = "default_premium_mask")]
    pub premium_mask: u32,
}

impl EntitlementsConfig {
    /// Builds the validated tier table.
    pub fn tier_masks(&self) -> Result<TierMasks, ValidationError> {
        let known = FeatureMask::from_features(&Feature::ALL);
        let basic = FeatureMask::from_bits(self.basic_mask);
        let premium = FeatureMask::from_bits(self.premium_mask);

        for (name, mask) in [("basic_mask", basic), ("premium_mask", premium)] {
            if !known.is_superset_of(mask) {
                return Err(ValidationError::InvalidFeatureMasks(format!(
                    "{} {} sets unknown feature bits",
                    name, mask
                )));
            }
        }

        TierMasks::new(basic, premium)
            .map_err(|e| ValidationError::InvalidFeatureMasks(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tier_masks().map(|_| ())
    }
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            basic_mask: default_basic_mask(),
            premium_mask: default_premium_mask(),
        }
    }
}

fn default_basic_mask() -> u32 {
    FeatureMask::from_features(BASIC_FEATURES).bits()
}

fn default_premium_mask() -> u32 {
    FeatureMask::from_features(PREMIUM_FEATURES).bits()
}
