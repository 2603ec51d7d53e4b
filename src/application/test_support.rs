//! Shared fixtures for the handler tests.
//!
//! Wires the engine over the in-memory adapters with short deadlines, so
//! handler tests exercise the real lifecycle end to end. Both stores sit
//! behind thin wrappers that can be told to fail, see [`Faults`].

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::document::TextDocumentRenderer;
use crate::adapters::memory::{
    InMemoryNotificationOutbox, InMemoryQuoteSequence, InMemoryRegistrationRepository,
    InMemorySessionStore,
};
use crate::adapters::stripe::MockPaymentCapture;
use crate::domain::billing::{BankTransferDetails, VatRate};
use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, RegistrationId, Timestamp, TrainingSessionId,
};
use crate::domain::registration::{PaymentMethod, Registration};
use crate::domain::session::{CapacityError, SessionDetails, TrainingSession};
use crate::ports::{NotificationOutboxEntry, RegistrationRepository, SessionStore};

use super::{
    BillingPolicy, CapacityGuardConfig, CaptureConfig, ChoosePaymentMethodCommand,
    CreateRegistrationCommand, CreateSessionCommand, EnrollmentEngine, EnrollmentPorts,
    EnrollmentSettings, RegistrationLifecycle,
};

pub(crate) fn billing() -> BillingPolicy {
    BillingPolicy::new(
        VatRate::from_fraction(0.20).unwrap(),
        BankTransferDetails {
            account_holder: "Acme Training".to_string(),
            iban: "FR7630006000011234567890189".to_string(),
            bic: "AGRIFRPP".to_string(),
        },
    )
}

/// A learner registering in EUR.
pub(crate) fn learner_command(
    session_id: TrainingSessionId,
    email: &str,
) -> CreateRegistrationCommand {
    CreateRegistrationCommand {
        session_id,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        phone: None,
        company: Some("Analytical Engines Ltd".to_string()),
        currency: Currency::Eur,
    }
}

/// Scripted store failures shared by the wrappers below.
#[derive(Clone, Default)]
pub(crate) struct Faults {
    failing_releases: Arc<Mutex<u32>>,
    // (updates to let through first, updates to fail after that)
    failing_updates: Arc<Mutex<(u32, u32)>>,
}

impl Faults {
    /// The next `count` seat releases fail.
    pub fn fail_releases(&self, count: u32) {
        *self.failing_releases.lock().unwrap() = count;
    }

    /// After `skip` more successful updates, the following `count` fail.
    pub fn fail_updates(&self, skip: u32, count: u32) {
        *self.failing_updates.lock().unwrap() = (skip, count);
    }

    fn release_fails(&self) -> bool {
        let mut remaining = self.failing_releases.lock().unwrap();
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }

    fn update_fails(&self) -> bool {
        let mut state = self.failing_updates.lock().unwrap();
        match *state {
            (0, 0) => false,
            (0, failing) => {
                state.1 = failing - 1;
                true
            }
            (skip, failing) => {
                *state = (skip - 1, failing);
                false
            }
        }
    }
}

struct FaultySessionStore {
    inner: Arc<InMemorySessionStore>,
    faults: Faults,
}

#[async_trait]
impl SessionStore for FaultySessionStore {
    async fn insert(&self, session: &TrainingSession) -> Result<(), DomainError> {
        self.inner.insert(session).await
    }

    async fn find_by_id(
        &self,
        id: TrainingSessionId,
    ) -> Result<Option<TrainingSession>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn try_reserve(&self, id: TrainingSessionId) -> Result<(), CapacityError> {
        self.inner.try_reserve(id).await
    }

    async fn release(&self, id: TrainingSessionId) -> Result<bool, CapacityError> {
        if self.faults.release_fails() {
            return Err(CapacityError::infrastructure("connection reset"));
        }
        self.inner.release(id).await
    }

    async fn close(&self, id: TrainingSessionId, now: Timestamp) -> Result<bool, DomainError> {
        self.inner.close(id, now).await
    }

    async fn close_ended(&self, now: Timestamp) -> Result<Vec<TrainingSessionId>, DomainError> {
        self.inner.close_ended(now).await
    }
}

struct FaultyRegistrationRepository {
    inner: Arc<InMemoryRegistrationRepository>,
    faults: Faults,
}

#[async_trait]
impl RegistrationRepository for FaultyRegistrationRepository {
    async fn insert(&self, registration: &Registration) -> Result<(), DomainError> {
        self.inner.insert(registration).await
    }

    async fn update(
        &self,
        registration: &Registration,
        expected_version: u64,
        notification: Option<&NotificationOutboxEntry>,
    ) -> Result<(), DomainError> {
        if self.faults.update_fails() {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "connection reset",
            ));
        }
        self.inner
            .update(registration, expected_version, notification)
            .await
    }

    async fn find_by_id(&self, id: RegistrationId) -> Result<Option<Registration>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn find_stale(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError> {
        self.inner.find_stale(cutoff, limit).await
    }

    async fn find_pending_seat_releases(
        &self,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError> {
        self.inner.find_pending_seat_releases(limit).await
    }
}

pub(crate) struct Harness {
    pub engine: EnrollmentEngine,
    pub lifecycle: Arc<RegistrationLifecycle>,
    pub sessions: Arc<InMemorySessionStore>,
    pub registrations: Arc<InMemoryRegistrationRepository>,
    pub outbox: Arc<InMemoryNotificationOutbox>,
    pub capture: MockPaymentCapture,
    pub faults: Faults,
}

impl Harness {
    pub fn new() -> Self {
        let sessions = Arc::new(InMemorySessionStore::new());
        let outbox = Arc::new(InMemoryNotificationOutbox::new());
        let registrations = Arc::new(InMemoryRegistrationRepository::new(outbox.clone()));
        let capture = MockPaymentCapture::new();
        let faults = Faults::default();

        let mut settings = EnrollmentSettings::new(billing());
        settings.guard = CapacityGuardConfig {
            call_timeout: Duration::from_millis(200),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(1),
        };
        settings.capture = CaptureConfig {
            call_timeout: Duration::from_millis(200),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(1),
        };

        let engine = EnrollmentEngine::new(
            EnrollmentPorts {
                sessions: Arc::new(FaultySessionStore {
                    inner: sessions.clone(),
                    faults: faults.clone(),
                }),
                registrations: Arc::new(FaultyRegistrationRepository {
                    inner: registrations.clone(),
                    faults: faults.clone(),
                }),
                quotes: Arc::new(InMemoryQuoteSequence::new()),
                capture: Arc::new(capture.clone()),
                renderer: Arc::new(TextDocumentRenderer::new("Acme Training")),
            },
            settings,
        );

        Self {
            lifecycle: engine.lifecycle().clone(),
            engine,
            sessions,
            registrations,
            outbox,
            capture,
            faults,
        }
    }

    /// A two-day course next month, priced 1000.00 EUR.
    pub fn details(max_participants: u32) -> SessionDetails {
        let starts_at = Timestamp::now().add_days(30);
        SessionDetails {
            course_title: "Async Rust in Production".to_string(),
            location: "Lyon".to_string(),
            starts_at,
            ends_at: starts_at.add_days(2),
            prices: vec![Money::from_major(1000, Currency::Eur)],
            max_participants,
        }
    }

    pub async fn schedule(&self, details: SessionDetails) -> TrainingSession {
        self.engine
            .create_session
            .handle(CreateSessionCommand { details })
            .await
            .unwrap()
            .session
    }

    pub async fn session(&self, max_participants: u32) -> TrainingSession {
        self.schedule(Self::details(max_participants)).await
    }

    pub async fn register(&self, session: &TrainingSession, email: &str) -> Registration {
        self.engine
            .create_registration
            .handle(learner_command(session.id(), email))
            .await
            .unwrap()
            .registration
    }

    pub async fn choose_transfer(&self, id: RegistrationId) -> Registration {
        self.engine
            .choose_payment_method
            .handle(ChoosePaymentMethodCommand {
                registration_id: id,
                method: PaymentMethod::BankTransfer,
                payment_token: None,
            })
            .await
            .unwrap()
            .registration()
            .clone()
    }

    pub async fn choose_card(&self, id: RegistrationId) -> Registration {
        self.engine
            .choose_payment_method
            .handle(ChoosePaymentMethodCommand {
                registration_id: id,
                method: PaymentMethod::Card,
                payment_token: Some("pm_card_visa".to_string()),
            })
            .await
            .unwrap()
            .registration()
            .clone()
    }

    pub async fn seats_taken(&self, id: TrainingSessionId) -> u32 {
        self.sessions
            .find_by_id(id)
            .await
            .unwrap()
            .map(|s| s.current_participants())
            .unwrap_or(0)
    }
}
