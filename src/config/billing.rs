//! Billing configuration (provider API, webhook verification, redirects)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::error::ValidationError;

/// Billing provider and webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Provider API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Provider secret API key
    pub api_key: SecretString,

    /// Shared secret the provider signs webhooks with
    pub webhook_secret: SecretString,

    /// Oldest webhook timestamp accepted, in seconds
    #[serde(default = "default_replay_window")]
    pub replay_window_secs: i64,

    /// How far in the future a webhook timestamp may be, in seconds
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_secs: i64,

    /// Largest webhook body accepted, in bytes
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Budget for a single checkout or portal call, in seconds
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Origin redirect URLs must belong to, e.g. `https://app.example.com`
    pub app_origin: String,

    /// Provider price for the basic tier
    pub basic_price_id: String,

    /// Provider price for the premium tier
    pub premium_price_id: String,

    /// Reject events the provider marks as test mode
    #[serde(default)]
    pub require_livemode: bool,

    /// How long handled event ids are kept in the ledger.
    ///
    /// A pruned id would be applied again if the provider delivered it, so
    /// this must outlast every redelivery path: automatic retries stop after
    /// three days and events can be resent by hand for thirty.
    #[serde(default = "default_ledger_retention_days")]
    pub ledger_retention_days: u32,
}

impl BillingConfig {
    /// Check if using provider test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_test_")
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn ledger_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.ledger_retention_days))
    }

    /// Validate billing configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        let api_key = self.api_key.expose_secret();
        let webhook_secret = self.webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_WEBHOOK_SECRET"));
        }
        // Verify key prefixes for safety
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidApiKey);
        }
        if !webhook_secret.starts_with("whsec_") || webhook_secret.len() <= "whsec_".len() {
            return Err(ValidationError::InvalidWebhookSecret);
        }

        match Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ValidationError::InvalidApiBaseUrl),
        }

        if !(1..=3600).contains(&self.replay_window_secs) {
            return Err(ValidationError::InvalidReplayWindow);
        }
        if self.max_clock_skew_secs < 0 || self.max_clock_skew_secs > self.replay_window_secs {
            return Err(ValidationError::InvalidClockSkew);
        }
        if self.max_payload_bytes == 0 || self.max_payload_bytes > 1024 * 1024 {
            return Err(ValidationError::InvalidPayloadLimit);
        }
        if !(1..=60).contains(&self.provider_timeout_secs) {
            return Err(ValidationError::InvalidProviderTimeout);
        }
        if self.ledger_retention_days < MIN_LEDGER_RETENTION_DAYS {
            return Err(ValidationError::InvalidLedgerRetention(MIN_LEDGER_RETENTION_DAYS));
        }

        if self.basic_price_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_BASIC_PRICE_ID"));
        }
        if self.premium_price_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_PREMIUM_PRICE_ID"));
        }

        let origin = Url::parse(&self.app_origin)
            .map_err(|e| ValidationError::InvalidAppOrigin(e.to_string()))?;
        match origin.scheme() {
            "https" => {}
            "http" if production => return Err(ValidationError::AppOriginMustBeHttps),
            "http" => {}
            other => {
                return Err(ValidationError::InvalidAppOrigin(format!(
                    "unsupported scheme {}",
                    other
                )))
            }
        }

        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_replay_window() -> i64 {
    300
}

fn default_max_clock_skew() -> i64 {
    60
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}

fn default_provider_timeout() -> u64 {
    10
}

/// Longest provider redelivery horizon (manual resend) plus margin.
pub const MIN_LEDGER_RETENTION_DAYS: u32 = 35;

fn default_ledger_retention_days() -> u32 {
    90
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_config() -> BillingConfig {
        BillingConfig {
            api_base_url: default_api_base_url(),
            api_key: SecretString::new("sk_test_abcd1234".to_string()),
            webhook_secret: SecretString::new("whsec_xyz789".to_string()),
            replay_window_secs: default_replay_window(),
            max_clock_skew_secs: default_max_clock_skew(),
            max_payload_bytes: default_max_payload_bytes(),
            provider_timeout_secs: default_provider_timeout(),
            app_origin: "https://app.example.com".to_string(),
            basic_price_id: "price_basic".to_string(),
            premium_price_id: "price_premium".to_string(),
            require_livemode: false,
            ledger_retention_days: default_ledger_retention_days(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(config.validate(true).is_ok());
        assert!(config.is_test_mode());
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
        assert_eq!(config.ledger_retention(), chrono::Duration::days(90));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("sk_test_abcd1234"));
        assert!(!rendered.contains("whsec_xyz789"));
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = BillingConfig {
            api_key: SecretString::new("pk_test_xxx".to_string()),
            ..valid_config()
        };
        assert_eq!(config.validate(false), Err(ValidationError::InvalidApiKey));
    }

    #[test]
    fn test_validation_invalid_webhook_secret() {
        for secret in ["secret_xxx", "whsec_"] {
            let config = BillingConfig {
                webhook_secret: SecretString::new(secret.to_string()),
                ..valid_config()
            };
            assert_eq!(
                config.validate(false),
                Err(ValidationError::InvalidWebhookSecret),
                "{secret}"
            );
        }
    }

    #[test]
    fn test_validation_missing_webhook_secret() {
        let config = BillingConfig {
            webhook_secret: SecretString::new(String::new()),
            ..valid_config()
        };
        assert_eq!(
            config.validate(false),
            Err(ValidationError::MissingRequired("BILLING_WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_validation_replay_window_bounds() {
        for secs in [0, 3601] {
            let config = BillingConfig {
                replay_window_secs: secs,
                ..valid_config()
            };
            assert_eq!(config.validate(false), Err(ValidationError::InvalidReplayWindow));
        }
    }

    #[test]
    fn test_validation_clock_skew_within_window() {
        let config = BillingConfig {
            replay_window_secs: 30,
            max_clock_skew_secs: 60,
            ..valid_config()
        };
        assert_eq!(config.validate(false), Err(ValidationError::InvalidClockSkew));
    }

    #[test]
    fn test_validation_payload_limit() {
        let config = BillingConfig {
            max_payload_bytes: 2 * 1024 * 1024,
            ..valid_config()
        };
        assert_eq!(config.validate(false), Err(ValidationError::InvalidPayloadLimit));
    }

    #[test]
    fn test_ledger_retention_outlasts_redelivery() {
        for days in [0, 3, MIN_LEDGER_RETENTION_DAYS - 1] {
            let config = BillingConfig {
                ledger_retention_days: days,
                ..valid_config()
            };
            assert_eq!(
                config.validate(false),
                Err(ValidationError::InvalidLedgerRetention(MIN_LEDGER_RETENTION_DAYS))
            );
        }

        let config = BillingConfig {
            ledger_retention_days: MIN_LEDGER_RETENTION_DAYS,
            ..valid_config()
        };
        assert!(config.validate(false).is_ok());
        assert!(default_ledger_retention_days() > MIN_LEDGER_RETENTION_DAYS);
    }

    #[test]
    fn test_http_origin_only_outside_production() {
        let config = BillingConfig {
            app_origin: "http://localhost:5173".to_string(),
            ..valid_config()
        };
        assert!(config.validate(false).is_ok());
        assert_eq!(config.validate(true), Err(ValidationError::AppOriginMustBeHttps));
    }

    #[test]
    fn test_relative_origin_is_rejected() {
        let config = BillingConfig {
            app_origin: "/app".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(false),
            Err(ValidationError::InvalidAppOrigin(_))
        ));
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let config = BillingConfig {
            premium_price_id: " ".to_string(),
            ..valid_config()
        };
        assert_eq!(
            config.validate(false),
            Err(ValidationError::MissingRequired("BILLING_PREMIUM_PRICE_ID"))
        );
    }
}
