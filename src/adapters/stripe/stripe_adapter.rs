//! Stripe-compatible billing provider adapter.
//!
//! Mints hosted checkout and customer portal sessions over the provider's
//! form-encoded REST API.
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, basic_price, premium_price);
//! let adapter = StripeBillingAdapter::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::entitlement::PlanTier;
use crate::ports::{
    BillingProvider, BillingProviderError, BillingProviderErrorCode, CheckoutSessionRequest,
    PortalSessionRequest, RedirectSession,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Provider API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    api_base_url: String,

    /// Provider price for each paid tier.
    basic_price_id: String,
    premium_price_id: String,

    timeout: Duration,
}

impl StripeConfig {
    pub fn new(
        api_key: SecretString,
        basic_price_id: impl Into<String>,
        premium_price_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            basic_price_id: basic_price_id.into(),
            premium_price_id: premium_price_id.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn price_id(&self, tier: PlanTier) -> Result<&str, BillingProviderError> {
        match tier {
            PlanTier::Basic => Ok(&self.basic_price_id),
            PlanTier::Premium => Ok(&self.premium_price_id),
            PlanTier::None => Err(BillingProviderError::rejected(
                "no price configured for tier 'none'",
            )),
        }
    }
}

pub struct StripeBillingAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl StripeBillingAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, BillingProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BillingProviderError::network(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<RedirectSession, BillingProviderError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let mut request = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BillingProviderError::timeout(self.config.timeout.as_secs())
            } else {
                BillingProviderError::network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_response(status, &body));
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            BillingProviderError::new(
                BillingProviderErrorCode::InvalidResponse,
                format!("Failed to parse provider response: {}", e),
            )
        })?;

        let url = session.url.ok_or_else(|| {
            BillingProviderError::new(
                BillingProviderErrorCode::InvalidResponse,
                "provider session has no redirect url",
            )
        })?;

        Ok(RedirectSession {
            id: session.id,
            url,
        })
    }
}

fn map_error_response(status: StatusCode, body: &str) -> BillingProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("provider returned {}", status));

    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BillingProviderErrorCode::AuthenticationError
        }
        StatusCode::TOO_MANY_REQUESTS => BillingProviderErrorCode::RateLimited,
        s if s.is_server_error() => BillingProviderErrorCode::NetworkError,
        _ => BillingProviderErrorCode::Rejected,
    };

    let err = BillingProviderError::new(code, message);
    match parsed.and_then(|e| e.error.code) {
        Some(provider_code) => err.with_provider_code(provider_code),
        None => err,
    }
}

#[async_trait]
impl BillingProvider for StripeBillingAdapter {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<RedirectSession, BillingProviderError> {
        let price_id = self.config.price_id(request.tier)?.to_string();
        let account_id = request.account_id.to_string();
        let tier = request.tier.as_str().to_string();

        // Account and tier ride along so the confirming webhooks can be reconciled
        let mut params = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", account_id.clone()),
            ("metadata[account_id]", account_id.clone()),
            ("metadata[tier]", tier.clone()),
            ("subscription_data[metadata][account_id]", account_id),
            ("subscription_data[metadata][tier]", tier),
        ];
        if let Some(customer) = request.customer_ref {
            params.push(("customer", customer));
        }

        self.post_form(
            "/v1/checkout/sessions",
            &params,
            Some(&request.idempotency_key),
        )
        .await
    }

    async fn create_portal_session(
        &self,
        request: PortalSessionRequest,
    ) -> Result<RedirectSession, BillingProviderError> {
        let params = [
            ("customer", request.customer_ref),
            ("return_url", request.return_url),
        ];

        self.post_form("/v1/billing_portal/sessions", &params, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StripeConfig {
        StripeConfig::new(
            SecretString::new("sk_test_123".to_string()),
            "price_basic",
            "price_premium",
        )
    }

    #[test]
    fn price_ids_follow_tier() {
        let config = config();
        assert_eq!(config.price_id(PlanTier::Basic).unwrap(), "price_basic");
        assert_eq!(config.price_id(PlanTier::Premium).unwrap(), "price_premium");
        assert!(config.price_id(PlanTier::None).is_err());
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = config().with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn error_response_uses_provider_message_and_code() {
        let body = r#"{"error":{"message":"No such price: 'price_x'","code":"resource_missing"}}"#;
        let err = map_error_response(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code, BillingProviderErrorCode::Rejected);
        assert_eq!(err.message, "No such price: 'price_x'");
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
    }

    #[test]
    fn error_response_maps_status_classes() {
        assert_eq!(
            map_error_response(StatusCode::UNAUTHORIZED, "").code,
            BillingProviderErrorCode::AuthenticationError
        );
        assert_eq!(
            map_error_response(StatusCode::TOO_MANY_REQUESTS, "").code,
            BillingProviderErrorCode::RateLimited
        );
        assert_eq!(
            map_error_response(StatusCode::BAD_GATEWAY, "<html>").code,
            BillingProviderErrorCode::NetworkError
        );
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_network_error() {
        let adapter = StripeBillingAdapter::new(
            config()
                .with_base_url("http://127.0.0.1:1")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let result = adapter
            .create_portal_session(PortalSessionRequest {
                customer_ref: "cus_1".to_string(),
                return_url: "https://app.example.com/account".to_string(),
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.code,
            BillingProviderErrorCode::NetworkError | BillingProviderErrorCode::Timeout
        ));
    }
}
