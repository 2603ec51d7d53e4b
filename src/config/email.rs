//! Email configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Email configuration (Resend)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Resend API key. Left empty outside production to keep messages in
    /// memory instead of sending them.
    #[serde(default)]
    pub resend_api_key: String,

    /// Resend API base URL
    #[serde(default = "default_api_base_url")]
    pub resend_api_base_url: String,

    /// From email address
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// From name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// HTTP timeout for one send, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl EmailConfig {
    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Check if a Resend key is configured at all
    pub fn is_configured(&self) -> bool {
        !self.resend_api_key.is_empty()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate email configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if !self.from_email.contains('@') {
            return Err(ValidationError::InvalidFromEmail);
        }
        if self.resend_api_key.is_empty() {
            if production {
                return Err(ValidationError::MissingRequired("RESEND_API_KEY"));
            }
            return Ok(());
        }
        if !self.resend_api_key.starts_with("re_") {
            return Err(ValidationError::InvalidResendKey);
        }
        Ok(())
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: String::new(),
            resend_api_base_url: default_api_base_url(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.resend.com".to_string()
}

fn default_from_email() -> String {
    "inscriptions@example.com".to_string()
}

fn default_from_name() -> String {
    "Training Enrollment".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_config_defaults() {
        let config = EmailConfig::default();
        assert_eq!(config.from_name, "Training Enrollment");
        assert_eq!(config.resend_api_base_url, "https://api.resend.com");
        assert!(!config.is_configured());
    }

    #[test]
    fn test_from_header() {
        let config = EmailConfig {
            from_email: "support@example.com".to_string(),
            from_name: "Support Team".to_string(),
            ..Default::default()
        };
        assert_eq!(config.from_header(), "Support Team <support@example.com>");
    }

    #[test]
    fn test_missing_api_key_only_fails_in_production() {
        let config = EmailConfig::default();
        assert!(config.validate(false).is_ok());
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = EmailConfig {
            resend_api_key: "sk_xxx".to_string(), // Wrong prefix
            ..Default::default()
        };
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_validation_invalid_from_email() {
        let config = EmailConfig {
            resend_api_key: "re_xxx".to_string(),
            from_email: "invalid-email".to_string(),
            ..Default::default()
        };
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        let config = EmailConfig {
            resend_api_key: "re_abcd1234".to_string(),
            ..Default::default()
        };
        assert!(config.validate(true).is_ok());
    }
}
