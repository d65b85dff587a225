//! In-memory adapters for development and tests.

mod in_memory_billing_store;

pub use in_memory_billing_store::InMemoryBillingStore;
