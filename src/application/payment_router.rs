//! Payment router.
//!
//! Drives the two payment branches. The card branch charges synchronously,
//! retrying transient gateway failures under one idempotency key so a retry
//! can never charge twice. The bank-transfer branch only allocates a quote
//! number; the money arrives later and an administrator confirms it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::domain::billing::{AmountBreakdown, QuoteNumber};
use crate::domain::foundation::Timestamp;
use crate::domain::registration::{Registration, RegistrationError};
use crate::domain::session::TrainingSession;
use crate::ports::{CaptureReceipt, CaptureRequest, PaymentCapture, PaymentError, QuoteSequence};

/// Timeouts and retries for card capture.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Deadline for one gateway call.
    pub call_timeout: Duration,
    /// Further tries after a transient failure.
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles after that.
    pub retry_backoff: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Routes a registration to its payment branch.
pub struct PaymentRouter {
    capture: Arc<dyn PaymentCapture>,
    quotes: Arc<dyn QuoteSequence>,
    config: CaptureConfig,
}

impl PaymentRouter {
    pub fn new(
        capture: Arc<dyn PaymentCapture>,
        quotes: Arc<dyn QuoteSequence>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            capture,
            quotes,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Key shared by every capture attempt for one registration.
    pub fn idempotency_key(registration: &Registration) -> String {
        format!("registration-{}", registration.id())
    }

    /// Charges the tax-inclusive amount against the card token.
    ///
    /// Transient failures are retried; declines and other final failures
    /// come straight back.
    pub async fn capture_card(
        &self,
        registration: &Registration,
        session: &TrainingSession,
        amounts: &AmountBreakdown,
        payment_token: &str,
    ) -> Result<CaptureReceipt, PaymentError> {
        let request = CaptureRequest {
            amount: amounts.amount_due(),
            payment_token: payment_token.to_string(),
            idempotency_key: Self::idempotency_key(registration),
            description: format!(
                "{} ({}, {})",
                session.course_title(),
                session.location(),
                session.starts_at().format_date()
            ),
            receipt_email: Some(registration.learner().email().to_string()),
        };

        let attempts = self.config.retry_attempts.saturating_add(1);
        let mut backoff = self.config.retry_backoff;

        for attempt in 1..=attempts {
            let error = match time::timeout(self.config.call_timeout, self.capture.capture(&request))
                .await
            {
                Ok(Ok(receipt)) => return Ok(receipt),
                Ok(Err(e)) => e,
                Err(_) => PaymentError::timeout(format!(
                    "Gateway did not answer within {}s",
                    self.config.call_timeout.as_secs()
                )),
            };

            if !error.retryable || attempt == attempts {
                return Err(error);
            }

            tracing::warn!(
                registration_id = %registration.id(),
                attempt,
                error = %error,
                "Card capture failed transiently; retrying"
            );
            time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }

        Err(PaymentError::timeout("Card capture retries exhausted"))
    }

    /// Allocates the next quote number for the year of `now`.
    pub async fn issue_quote(&self, now: Timestamp) -> Result<QuoteNumber, RegistrationError> {
        let year = now.year();
        let sequence = self.quotes.next_value(year).await?;
        Ok(QuoteNumber::issue(year, sequence))
    }
}
