//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `TRAINING_ENROLLMENT_` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use training_enrollment::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Holds expire after {:?}", config.enrollment.hold_timeout());
//! ```

mod database;
mod email;
mod enrollment;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use email::EmailConfig;
pub use enrollment::EnrollmentConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Process configuration (environment, logging, shutdown)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment configuration (Stripe)
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Email configuration (Resend)
    #[serde(default)]
    pub email: EmailConfig,

    /// Pricing, holds and background job timing
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TRAINING_ENROLLMENT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `TRAINING_ENROLLMENT__DATABASE__URL=...` -> `database.url = ...`
    /// - `TRAINING_ENROLLMENT__ENROLLMENT__HOLD_TIMEOUT_SECS=900` -> `enrollment.hold_timeout_secs = 900`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TRAINING_ENROLLMENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Production additionally requires the Stripe and Resend keys and the
    /// bank transfer details.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let production = self.is_production();
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(production)?;
        self.email.validate(production)?;
        self.enrollment.validate(production)?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "TRAINING_ENROLLMENT__DATABASE__URL",
        "TRAINING_ENROLLMENT__PAYMENT__STRIPE_API_KEY",
        "TRAINING_ENROLLMENT__EMAIL__RESEND_API_KEY",
        "TRAINING_ENROLLMENT__SERVER__ENVIRONMENT",
        "TRAINING_ENROLLMENT__ENROLLMENT__HOLD_TIMEOUT_SECS",
        "TRAINING_ENROLLMENT__ENROLLMENT__VAT_RATE",
    ];

    fn set_minimal_env() {
        env::set_var("TRAINING_ENROLLMENT__DATABASE__URL", "postgresql://test@localhost/test");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.enrollment.hold_timeout_secs, 1800);
        assert!(!config.payment.is_configured());
    }

    #[test]
    fn test_development_config_validates_without_keys() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_production_requires_keys() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("TRAINING_ENROLLMENT__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enrollment_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("TRAINING_ENROLLMENT__ENROLLMENT__HOLD_TIMEOUT_SECS", "900");
        env::set_var("TRAINING_ENROLLMENT__ENROLLMENT__VAT_RATE", "0.055");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.enrollment.hold_timeout_secs, 900);
        assert_eq!(config.enrollment.vat().unwrap().basis_points(), 550);
    }
}
