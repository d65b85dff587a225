//! Entitlement domain - plans, feature masks and the reconciliation rules.
//!
//! # Invariants
//!
//! - `status` in {active, past_due} implies `feature_mask == mask_for(plan)`
//! - `status` in {inactive, cancelled} implies `plan == none` and an empty mask
//! - plan and mask only change together, through [`EntitlementTransition`]

mod account;
mod errors;
mod feature_mask;
mod plan;
mod status;
mod transition;

pub use account::{AccountEntitlement, EntitlementSnapshot, EntitlementTransition, ProviderRefs};
pub use errors::BillingError;
pub use feature_mask::{Feature, FeatureMask, TierMasks, BASIC_FEATURES, PREMIUM_FEATURES};
pub use plan::PlanTier;
pub use status::SubscriptionStatus;
pub use transition::{reconcile, BillingSignal, Reconciliation};
