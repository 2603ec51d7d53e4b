//! Enrollment configuration: pricing, holds, deadlines and background jobs

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::notification::NotificationRelayConfig;
use crate::application::{BillingPolicy, CapacityGuardConfig, CaptureConfig, EnrollmentSettings};
use crate::domain::billing::{BankTransferDetails, VatRate};

use super::error::ValidationError;

/// Business rules and timing for the enrollment engine
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentConfig {
    /// VAT rate as a fraction, e.g. 0.20
    #[serde(default = "default_vat_rate")]
    pub vat_rate: f64,

    /// Idle time after which a Created/PendingPayment registration is cancelled
    #[serde(default = "default_hold_timeout")]
    pub hold_timeout_secs: u64,

    /// Registrations examined per expiry sweep
    #[serde(default = "default_expiry_batch_size")]
    pub expiry_batch_size: u32,

    /// Deadline for one seat reservation call
    #[serde(default = "default_reserve_timeout")]
    pub reserve_timeout_ms: u64,

    /// Retries after a timed-out reservation
    #[serde(default = "default_reserve_retry_attempts")]
    pub reserve_retry_attempts: u32,

    /// Deadline for one card capture call
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,

    /// Retries after a transient capture failure
    #[serde(default = "default_capture_retry_attempts")]
    pub capture_retry_attempts: u32,

    /// Delay between session sweeps
    #[serde(default = "default_sweep_interval")]
    pub session_sweep_interval_secs: u64,

    /// Delay between hold expiry sweeps
    #[serde(default = "default_sweep_interval")]
    pub hold_sweep_interval_secs: u64,

    /// Outbox poll interval
    #[serde(default = "default_notification_poll_interval")]
    pub notification_poll_interval_ms: u64,

    /// Delivery attempts before a notification is dead-lettered
    #[serde(default = "default_notification_max_attempts")]
    pub notification_max_attempts: u32,

    /// Delay after the first failed delivery
    #[serde(default = "default_notification_backoff_base")]
    pub notification_backoff_base_ms: u64,

    /// Upper bound on the delivery backoff
    #[serde(default = "default_notification_backoff_max")]
    pub notification_backoff_max_secs: u64,

    /// Name printed at the top of receipts and quotes
    #[serde(default = "default_issuer_name")]
    pub issuer_name: String,

    /// Bank transfer instructions printed on quotes
    #[serde(default)]
    pub bank_account_holder: String,
    #[serde(default)]
    pub bank_iban: String,
    #[serde(default)]
    pub bank_bic: String,
}

impl EnrollmentConfig {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_secs(self.hold_timeout_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn hold_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.hold_sweep_interval_secs)
    }

    /// Validated VAT rate
    pub fn vat(&self) -> Result<VatRate, ValidationError> {
        VatRate::from_fraction(self.vat_rate).map_err(|_| ValidationError::InvalidVatRate)
    }

    pub fn bank_details(&self) -> BankTransferDetails {
        BankTransferDetails {
            account_holder: self.bank_account_holder.clone(),
            iban: self.bank_iban.clone(),
            bic: self.bank_bic.clone(),
        }
    }

    /// Engine settings derived from this section
    pub fn settings(&self) -> Result<EnrollmentSettings, ValidationError> {
        Ok(EnrollmentSettings {
            billing: BillingPolicy::new(self.vat()?, self.bank_details()),
            guard: CapacityGuardConfig {
                call_timeout: Duration::from_millis(self.reserve_timeout_ms),
                retry_attempts: self.reserve_retry_attempts,
                ..CapacityGuardConfig::default()
            },
            capture: CaptureConfig {
                call_timeout: Duration::from_secs(self.capture_timeout_secs),
                retry_attempts: self.capture_retry_attempts,
                ..CaptureConfig::default()
            },
            hold_timeout: self.hold_timeout(),
            expiry_batch_size: self.expiry_batch_size,
        })
    }

    /// Relay settings derived from this section
    pub fn relay_config(&self) -> NotificationRelayConfig {
        NotificationRelayConfig::default()
            .with_poll_interval(Duration::from_millis(self.notification_poll_interval_ms))
            .with_max_attempts(self.notification_max_attempts)
            .with_backoff(
                Duration::from_millis(self.notification_backoff_base_ms),
                Duration::from_secs(self.notification_backoff_max_secs),
            )
    }

    /// Validate enrollment configuration
    ///
    /// Bank details are mandatory in production, since every quote prints them.
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        self.vat()?;

        let positive = [
            ("hold_timeout_secs", self.hold_timeout_secs),
            ("expiry_batch_size", u64::from(self.expiry_batch_size)),
            ("reserve_timeout_ms", self.reserve_timeout_ms),
            ("capture_timeout_secs", self.capture_timeout_secs),
            ("session_sweep_interval_secs", self.session_sweep_interval_secs),
            ("hold_sweep_interval_secs", self.hold_sweep_interval_secs),
            ("notification_poll_interval_ms", self.notification_poll_interval_ms),
            ("notification_max_attempts", u64::from(self.notification_max_attempts)),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ValidationError::MustBePositive(name));
            }
        }

        if Duration::from_millis(self.notification_backoff_base_ms)
            > Duration::from_secs(self.notification_backoff_max_secs)
        {
            return Err(ValidationError::InvalidBackoff);
        }

        if production {
            if self.bank_account_holder.trim().is_empty() {
                return Err(ValidationError::MissingRequired("BANK_ACCOUNT_HOLDER"));
            }
            if self.bank_iban.trim().is_empty() {
                return Err(ValidationError::MissingRequired("BANK_IBAN"));
            }
            if self.bank_bic.trim().is_empty() {
                return Err(ValidationError::MissingRequired("BANK_BIC"));
            }
        }
        Ok(())
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            vat_rate: default_vat_rate(),
            hold_timeout_secs: default_hold_timeout(),
            expiry_batch_size: default_expiry_batch_size(),
            reserve_timeout_ms: default_reserve_timeout(),
            reserve_retry_attempts: default_reserve_retry_attempts(),
            capture_timeout_secs: default_capture_timeout(),
            capture_retry_attempts: default_capture_retry_attempts(),
            session_sweep_interval_secs: default_sweep_interval(),
            hold_sweep_interval_secs: default_sweep_interval(),
            notification_poll_interval_ms: default_notification_poll_interval(),
            notification_max_attempts: default_notification_max_attempts(),
            notification_backoff_base_ms: default_notification_backoff_base(),
            notification_backoff_max_secs: default_notification_backoff_max(),
            issuer_name: default_issuer_name(),
            bank_account_holder: String::new(),
            bank_iban: String::new(),
            bank_bic: String::new(),
        }
    }
}

fn default_vat_rate() -> f64 {
    0.20
}

fn default_hold_timeout() -> u64 {
    1800
}

fn default_expiry_batch_size() -> u32 {
    200
}

fn default_reserve_timeout() -> u64 {
    2000
}

fn default_reserve_retry_attempts() -> u32 {
    3
}

fn default_capture_timeout() -> u64 {
    30
}

fn default_capture_retry_attempts() -> u32 {
    2
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_notification_poll_interval() -> u64 {
    500
}

fn default_notification_max_attempts() -> u32 {
    8
}

fn default_notification_backoff_base() -> u64 {
    1000
}

fn default_notification_backoff_max() -> u64 {
    300
}

fn default_issuer_name() -> String {
    "Training Enrollment".to_string()
}
