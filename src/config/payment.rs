//! Payment configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key. Left empty outside production to run against
    /// the mock gateway.
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe API base URL
    #[serde(default = "default_api_base_url")]
    pub stripe_api_base_url: String,

    /// HTTP timeout for one gateway request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl PaymentConfig {
    /// Check if a Stripe key is configured at all
    pub fn is_configured(&self) -> bool {
        !self.stripe_api_key.is_empty()
    }

    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate payment configuration
    ///
    /// A key is mandatory in production; elsewhere an empty key selects the
    /// mock gateway.
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            if production {
                return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
            }
            return Ok(());
        }

        // Verify key prefix for safety
        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("request_timeout_secs"));
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}
