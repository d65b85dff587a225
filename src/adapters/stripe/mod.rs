//! Stripe-compatible billing provider adapter.
//!
//! Implements the `BillingProvider` port for checkout and customer portal
//! sessions. Webhook verification lives in the billing domain, since it
//! needs nothing but the shared secret.
//!
//! # Security
//!
//! - The API key is held as `secrecy::SecretString`
//! - Checkout requests carry an `Idempotency-Key` header

mod mock_billing_provider;
mod stripe_adapter;

pub use mock_billing_provider::{MockBillingProvider, ProviderCall};
pub use stripe_adapter::{StripeBillingAdapter, StripeConfig};
