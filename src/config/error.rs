//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Server host must be an IP address: {0}")]
    InvalidHost(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Request timeout must be between 1 and 300 seconds")]
    InvalidTimeout,

    #[error("Request timeout ({request_secs}s) must exceed the provider timeout ({provider_secs}s)")]
    RequestTimeoutTooShort { request_secs: u64, provider_secs: u64 },

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("A database is required in production")]
    DatabaseRequiredInProduction,

    #[error("Invalid billing API key format")]
    InvalidApiKey,

    #[error("Invalid webhook signing secret format")]
    InvalidWebhookSecret,

    #[error("Invalid billing API base URL")]
    InvalidApiBaseUrl,

    #[error("Replay window must be between 1 and 3600 seconds")]
    InvalidReplayWindow,

    #[error("Clock skew allowance must not exceed the replay window")]
    InvalidClockSkew,

    #[error("Webhook payload limit must be between 1 byte and 1 MiB")]
    InvalidPayloadLimit,

    #[error("Provider timeout must be between 1 and 60 seconds")]
    InvalidProviderTimeout,

    #[error("Invalid application origin: {0}")]
    InvalidAppOrigin(String),

    #[error("Application origin must use HTTPS in production")]
    AppOriginMustBeHttps,

    #[error("Ledger retention must be at least {0} days to outlast provider redelivery")]
    InvalidLedgerRetention(u32),

    #[error("Invalid tier feature masks: {0}")]
    InvalidFeatureMasks(String),
}
