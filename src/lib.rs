//! Entitlement Sync - billing events to feature entitlements
//!
//! Receives signed subscription events from a billing provider, verifies
//! them, and reconciles each account's plan, status and feature mask
//! exactly once per event. Also issues checkout and customer portal
//! sessions on behalf of accounts.

pub mod adapters;
pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
