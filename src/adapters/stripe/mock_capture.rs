//! Mock payment capture for testing.
//!
//! Replays scripted outcomes in order, then succeeds. Every request is
//! recorded so tests can assert on amounts and idempotency keys.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::ports::{CaptureReceipt, CaptureRequest, PaymentCapture, PaymentError};

/// Mock gateway for tests.
#[derive(Clone, Default)]
pub struct MockPaymentCapture {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    scripted: VecDeque<Result<CaptureReceipt, PaymentError>>,
    delay: Option<Duration>,
    calls: Vec<CaptureRequest>,
}

impl MockPaymentCapture {
    /// Creates a mock that approves every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that declines the next charge.
    pub async fn declining(message: &str) -> Self {
        let mock = Self::new();
        mock.push_outcome(Err(PaymentError::card_declined(message)))
            .await;
        mock
    }

    /// Queues the outcome of a future call.
    pub async fn push_outcome(&self, outcome: Result<CaptureReceipt, PaymentError>) {
        self.state.lock().await.scripted.push_back(outcome);
    }

    /// Makes every call wait before answering.
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    /// Every request received so far.
    pub async fn calls(&self) -> Vec<CaptureRequest> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }
}

#[async_trait]
impl PaymentCapture for MockPaymentCapture {
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureReceipt, PaymentError> {
        let (outcome, delay) = {
            let mut state = self.state.lock().await;
            state.calls.push(request.clone());
            let n = state.calls.len();
            let outcome = state.scripted.pop_front().unwrap_or_else(|| {
                Ok(CaptureReceipt {
                    reference: format!("pi_mock_{}", n),
                })
            });
            (outcome, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
