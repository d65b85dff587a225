//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, errors)
//! - `entitlement` - Plans, feature masks, subscription status and reconciliation rules
//! - `billing` - Provider event envelope and webhook verification

pub mod billing;
pub mod entitlement;
pub mod foundation;
