//! NotificationRelay - Background service that drains the notification outbox.
//!
//! Transitions write their notification into the outbox inside the same
//! atomic step as the registration change. This relay delivers them
//! afterwards:
//!
//! 1. Claim due entries under a lease, so concurrent relays never double-send
//! 2. Hand each one to the `NotificationSink` with its stable idempotency key
//! 3. Mark delivered, reschedule with exponential backoff, or dead-letter
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 500ms | How often to look for due entries |
//! | `batch_size` | 50 | Max entries claimed per poll |
//! | `concurrency` | 8 | Sends in flight at once |
//! | `lease` | 60s | How long a claim hides an entry from other relays |
//! | `max_attempts` | 8 | Attempts before an entry is dead-lettered |
//! | `backoff_base` | 1s | Delay after the first failure |
//! | `backoff_max` | 300s | Upper bound on any delay |
//!
//! ## Graceful Shutdown
//!
//! On shutdown the relay drains one final batch before stopping.

use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{NotificationOutbox, NotificationOutboxEntry, NotificationSink};

/// Configuration for the NotificationRelay service.
#[derive(Debug, Clone)]
pub struct NotificationRelayConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub concurrency: usize,
    pub lease: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for NotificationRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 50,
            concurrency: 8,
            lease: Duration::from_secs(60),
            max_attempts: 8,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl NotificationRelayConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max.max(base);
        self
    }

    /// Delay before the next try, given how many attempts have been made.
    ///
    /// `base * 2^(attempts - 1)`, capped at `backoff_max`.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }
}

/// Running totals, readable while the relay runs.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

impl DeliveryStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    /// Entries given up on. Anything above zero needs an operator.
    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }
}

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Retrying,
    DeadLettered,
}

/// Background service that delivers queued notifications.
pub struct NotificationRelay {
    outbox: Arc<dyn NotificationOutbox>,
    sink: Arc<dyn NotificationSink>,
    config: NotificationRelayConfig,
    stats: Arc<DeliveryStats>,
}

impl NotificationRelay {
    pub fn new(outbox: Arc<dyn NotificationOutbox>, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_config(outbox, sink, NotificationRelayConfig::default())
    }

    pub fn with_config(
        outbox: Arc<dyn NotificationOutbox>,
        sink: Arc<dyn NotificationSink>,
        config: NotificationRelayConfig,
    ) -> Self {
        Self {
            outbox,
            sink,
            config,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        self.stats.clone()
    }

    /// Run the relay loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.log_errors(self.process_batch().await);
                        tracing::info!("Notification relay stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    // A failed poll (database down) is retried on the next tick.
                    self.log_errors(self.process_batch().await);
                }
            }
        }
    }

    fn log_errors(&self, result: Result<usize, DomainError>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Notification relay poll failed");
        }
    }

    /// Process a single batch of due notifications.
    ///
    /// Returns how many were delivered.
    pub async fn process_batch(&self) -> Result<usize, DomainError> {
        self.poll_at(Timestamp::now()).await
    }

    /// Run exactly one poll cycle as if the clock read `now`.
    pub async fn poll_at(&self, now: Timestamp) -> Result<usize, DomainError> {
        let entries = self
            .outbox
            .claim_due(now, self.config.lease.as_secs(), self.config.batch_size)
            .await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let outcomes: Vec<Result<Delivery, DomainError>> = stream::iter(entries)
            .map(|entry| self.deliver(entry, now))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut delivered = 0;
        for outcome in outcomes {
            if outcome? == Delivery::Delivered {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn deliver(
        &self,
        entry: NotificationOutboxEntry,
        now: Timestamp,
    ) -> Result<Delivery, DomainError> {
        let attempts = entry.attempts + 1;
        let key = entry.idempotency_key();

        match self.sink.send(&entry.notification, &key).await {
            Ok(()) => {
                self.outbox
                    .mark_delivered(entry.id, attempts, Timestamp::now())
                    .await?;
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    registration_id = %entry.registration_id,
                    marker = %entry.marker,
                    attempts,
                    "Notification delivered"
                );
                Ok(Delivery::Delivered)
            }
            Err(e) if !e.is_retryable() || attempts >= self.config.max_attempts => {
                let reason = e.to_string();
                self.outbox.mark_dead(entry.id, attempts, &reason).await?;
                self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    registration_id = %entry.registration_id,
                    marker = %entry.marker,
                    recipient = %entry.notification.recipient,
                    attempts,
                    error = %reason,
                    "Notification dead-lettered"
                );
                Ok(Delivery::DeadLettered)
            }
            Err(e) => {
                let delay = self.config.backoff_for(attempts);
                let next = now.plus_std(delay);
                self.outbox
                    .schedule_retry(entry.id, attempts, next, &e.to_string())
                    .await?;
                self.stats.retried.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    registration_id = %entry.registration_id,
                    marker = %entry.marker,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Notification delivery failed; will retry"
                );
                Ok(Delivery::Retrying)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::email::RecordingNotificationSink;
    use crate::adapters::memory::InMemoryNotificationOutbox;
    use crate::domain::foundation::RegistrationId;
    use crate::domain::registration::TransitionMarker;
    use crate::ports::{Notification, NotificationError, NotificationStatus};
    use serde_json::json;

    fn entry(marker: TransitionMarker) -> NotificationOutboxEntry {
        NotificationOutboxEntry::new(
            RegistrationId::new(),
            marker,
            Notification::new("ada@example.com", marker.template(), json!({})),
            Timestamp::now(),
        )
    }

    fn relay(
        config: NotificationRelayConfig,
    ) -> (
        NotificationRelay,
        Arc<InMemoryNotificationOutbox>,
        RecordingNotificationSink,
    ) {
        let outbox = Arc::new(InMemoryNotificationOutbox::new());
        let sink = RecordingNotificationSink::new();
        let relay = NotificationRelay::with_config(outbox.clone(), Arc::new(sink.clone()), config);
        (relay, outbox, sink)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = NotificationRelayConfig::default()
            .with_backoff(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(config.backoff_for(1), Duration::from_secs(1));
        assert_eq!(config.backoff_for(2), Duration::from_secs(2));
        assert_eq!(config.backoff_for(4), Duration::from_secs(8));
        assert_eq!(config.backoff_for(5), Duration::from_secs(10));
        assert_eq!(config.backoff_for(200), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn delivers_due_entries_with_stable_keys() {
        let (relay, outbox, sink) = relay(NotificationRelayConfig::default());
        let e = entry(TransitionMarker::PaymentConfirmed);
        outbox.enqueue(&e).await.unwrap();

        let delivered = relay.poll_at(Timestamp::now().plus_secs(1)).await.unwrap();
        assert_eq!(delivered, 1);

        let sent = sink.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].idempotency_key, e.idempotency_key());
        assert_eq!(outbox.count_with_status(NotificationStatus::Delivered).await, 1);
        assert_eq!(relay.stats().delivered(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_after_backoff() {
        let config = NotificationRelayConfig::default()
            .with_backoff(Duration::from_secs(5), Duration::from_secs(60));
        let (relay, outbox, sink) = relay(config);
        outbox.enqueue(&entry(TransitionMarker::QuoteIssued)).await.unwrap();
        sink.fail_next(NotificationError::transient("503")).await;

        let t0 = Timestamp::now().plus_secs(1);
        assert_eq!(relay.poll_at(t0).await.unwrap(), 0);

        let stored = &outbox.all().await[0];
        assert_eq!(stored.status, NotificationStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_error.as_deref(), Some("Notification delivery failed transiently: 503"));

        // Not due yet.
        assert_eq!(relay.poll_at(t0.plus_secs(2)).await.unwrap(), 0);
        assert_eq!(sink.attempts().await, 1);

        assert_eq!(relay.poll_at(t0.plus_secs(6)).await.unwrap(), 1);
        assert_eq!(outbox.all().await[0].attempts, 2);
        assert_eq!(relay.stats().retried(), 1);
    }

    #[tokio::test]
    async fn rejection_dead_letters_immediately() {
        let (relay, outbox, sink) = relay(NotificationRelayConfig::default());
        outbox.enqueue(&entry(TransitionMarker::RegistrationCancelled)).await.unwrap();
        sink.fail_next(NotificationError::rejected("mailbox does not exist")).await;

        relay.poll_at(Timestamp::now().plus_secs(1)).await.unwrap();

        assert_eq!(outbox.count_with_status(NotificationStatus::Dead).await, 1);
        assert_eq!(relay.stats().dead_lettered(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let config = NotificationRelayConfig::default()
            .with_max_attempts(2)
            .with_backoff(Duration::from_secs(1), Duration::from_secs(1));
        let (relay, outbox, sink) = relay(config);
        outbox.enqueue(&entry(TransitionMarker::QuoteIssued)).await.unwrap();
        sink.fail_next(NotificationError::transient("timeout")).await;
        sink.fail_next(NotificationError::transient("timeout")).await;

        let t0 = Timestamp::now().plus_secs(1);
        relay.poll_at(t0).await.unwrap();
        relay.poll_at(t0.plus_secs(5)).await.unwrap();
        relay.poll_at(t0.plus_secs(60)).await.unwrap();

        let stored = &outbox.all().await[0];
        assert_eq!(stored.status, NotificationStatus::Dead);
        assert_eq!(stored.attempts, 2);
        assert_eq!(sink.attempts().await, 2);
        assert!(sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let config = NotificationRelayConfig::default()
            .with_poll_interval(Duration::from_millis(10));
        let (relay, outbox, sink) = relay(config);
        outbox.enqueue(&entry(TransitionMarker::PaymentConfirmed)).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(sink.sent().await.len(), 1);
    }
}
