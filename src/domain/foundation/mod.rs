//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers and error types shared by the entitlement and
//! billing domains.

mod errors;
mod ids;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{AccountId, BillingEventId};
