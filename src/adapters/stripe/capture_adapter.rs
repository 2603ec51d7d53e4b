//! Stripe PaymentIntents adapter.
//!
//! Charges a card token in one round trip: the intent is created with
//! `confirm=true`, so a `succeeded` response means the funds are captured.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::ports::{CaptureReceipt, CaptureRequest, PaymentCapture, PaymentError, PaymentErrorCode};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_...)
    pub api_key: SecretString,

    /// Stripe API base URL (for testing)
    pub api_base_url: String,

    /// Upper bound on a single gateway call.
    pub request_timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            request_timeout,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Card capture through Stripe PaymentIntents.
pub struct StripeCaptureAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeCaptureAdapter {
    /// Create a new adapter.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn form_params(request: &CaptureRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("amount", request.amount.minor_units().to_string()),
            ("currency", request.amount.currency().gateway_code()),
            ("payment_method", request.payment_token.clone()),
            ("confirm", "true".to_string()),
            ("description", request.description.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
        ];
        if let Some(email) = &request.receipt_email {
            params.push(("receipt_email", email.clone()));
        }
        params
    }
}

#[async_trait]
impl PaymentCapture for StripeCaptureAdapter {
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureReceipt, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&Self::form_params(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentError::timeout(format!("Stripe did not answer: {}", e))
                } else {
                    PaymentError::network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                idempotency_key = %request.idempotency_key,
                "Stripe capture failed"
            );
            return Err(classify_failure(status.as_u16(), &body));
        }

        let intent: StripePaymentIntent = serde_json::from_str(&body)
            .map_err(|e| PaymentError::provider(format!("Unreadable Stripe response: {}", e)))?;

        match intent.status.as_str() {
            "succeeded" => Ok(CaptureReceipt { reference: intent.id }),
            "requires_action" | "requires_payment_method" => Err(PaymentError::card_declined(
                format!("Payment intent {} was not authorised", intent.id),
            )
            .with_provider_code(intent.status)),
            other => Err(PaymentError::provider(format!(
                "Payment intent {} ended in status {}",
                intent.id, other
            ))
            .with_provider_code(other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
}

/// Maps a non-2xx Stripe response onto a payment error.
fn classify_failure(status: u16, body: &str) -> PaymentError {
    let detail = serde_json::from_str::<StripeErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();
    let message = detail
        .message
        .clone()
        .unwrap_or_else(|| format!("Stripe returned HTTP {}", status));

    let code = match status {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        429 => PaymentErrorCode::RateLimitExceeded,
        402 => decline_code(detail.decline_code.as_deref().or(detail.code.as_deref())),
        _ if detail.kind.as_deref() == Some("card_error") => {
            decline_code(detail.decline_code.as_deref().or(detail.code.as_deref()))
        }
        _ => PaymentErrorCode::ProviderError,
    };

    let mut error = PaymentError::new(code, message);
    // Stripe replays the original result for a reused idempotency key, so a
    // gateway-side failure is safe to try again.
    if status >= 500 {
        error.retryable = true;
    }
    match detail.decline_code.or(detail.code) {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

fn decline_code(code: Option<&str>) -> PaymentErrorCode {
    match code {
        Some("insufficient_funds") => PaymentErrorCode::InsufficientFunds,
        Some("expired_card") => PaymentErrorCode::CardExpired,
        Some("incorrect_number") | Some("invalid_number") | Some("incorrect_cvc")
        | Some("invalid_cvc") | Some("invalid_expiry_month") | Some("invalid_expiry_year") => {
            PaymentErrorCode::InvalidCard
        }
        _ => PaymentErrorCode::CardDeclined,
    }
}
