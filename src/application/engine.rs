//! Enrollment engine - wires every handler over one set of ports.
//!
//! The engine owns the shared pieces (capacity guard, per-registration
//! locks, transition effects) so that all handlers in a process see the same
//! lock table and the same billing policy.

use std::sync::Arc;
use std::time::Duration;

use crate::ports::{
    DocumentRenderer, PaymentCapture, QuoteSequence, RegistrationRepository, SessionStore,
};

use super::handlers::{
    CancelRegistrationHandler, ChoosePaymentMethodHandler, CloseSessionHandler,
    ConfirmBankTransferHandler, CreateRegistrationHandler, CreateSessionHandler,
    ExpireStaleRegistrationsHandler, GetRegistrationHandler, SweepExpiredSessionsHandler,
};
use super::handlers::registration::{DEFAULT_EXPIRY_BATCH, DEFAULT_HOLD_TIMEOUT};
use super::{
    BillingPolicy, CapacityGuard, CapacityGuardConfig, CaptureConfig, PaymentRouter,
    RegistrationLifecycle, TransitionEffects,
};

/// Adapters the engine runs against.
#[derive(Clone)]
pub struct EnrollmentPorts {
    pub sessions: Arc<dyn SessionStore>,
    pub registrations: Arc<dyn RegistrationRepository>,
    pub quotes: Arc<dyn QuoteSequence>,
    pub capture: Arc<dyn PaymentCapture>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

/// Business and timing settings.
#[derive(Debug, Clone)]
pub struct EnrollmentSettings {
    pub billing: BillingPolicy,
    pub guard: CapacityGuardConfig,
    pub capture: CaptureConfig,
    pub hold_timeout: Duration,
    pub expiry_batch_size: u32,
}

impl EnrollmentSettings {
    pub fn new(billing: BillingPolicy) -> Self {
        Self {
            billing,
            guard: CapacityGuardConfig::default(),
            capture: CaptureConfig::default(),
            hold_timeout: DEFAULT_HOLD_TIMEOUT,
            expiry_batch_size: DEFAULT_EXPIRY_BATCH,
        }
    }
}

/// Every command and query handler, ready to call.
pub struct EnrollmentEngine {
    lifecycle: Arc<RegistrationLifecycle>,

    // Sessions
    pub create_session: Arc<CreateSessionHandler>,
    pub close_session: Arc<CloseSessionHandler>,
    pub sweep_sessions: Arc<SweepExpiredSessionsHandler>,

    // Registrations
    pub create_registration: Arc<CreateRegistrationHandler>,
    pub choose_payment_method: Arc<ChoosePaymentMethodHandler>,
    pub confirm_bank_transfer: Arc<ConfirmBankTransferHandler>,
    pub cancel_registration: Arc<CancelRegistrationHandler>,
    pub expire_stale: Arc<ExpireStaleRegistrationsHandler>,
    pub get_registration: Arc<GetRegistrationHandler>,
}

impl EnrollmentEngine {
    pub fn new(ports: EnrollmentPorts, settings: EnrollmentSettings) -> Self {
        let guard = CapacityGuard::new(ports.sessions.clone(), settings.guard);
        let effects = TransitionEffects::new(ports.renderer, settings.billing);
        let lifecycle = Arc::new(RegistrationLifecycle::new(
            ports.registrations,
            ports.sessions.clone(),
            guard,
            effects,
        ));
        let router = Arc::new(PaymentRouter::new(
            ports.capture,
            ports.quotes,
            settings.capture,
        ));

        Self {
            create_session: Arc::new(CreateSessionHandler::new(ports.sessions.clone())),
            close_session: Arc::new(CloseSessionHandler::new(ports.sessions.clone())),
            sweep_sessions: Arc::new(SweepExpiredSessionsHandler::new(ports.sessions)),
            create_registration: Arc::new(CreateRegistrationHandler::new(lifecycle.clone())),
            choose_payment_method: Arc::new(ChoosePaymentMethodHandler::new(
                lifecycle.clone(),
                router,
            )),
            confirm_bank_transfer: Arc::new(ConfirmBankTransferHandler::new(lifecycle.clone())),
            cancel_registration: Arc::new(CancelRegistrationHandler::new(lifecycle.clone())),
            expire_stale: Arc::new(ExpireStaleRegistrationsHandler::new(
                lifecycle.clone(),
                settings.hold_timeout,
                settings.expiry_batch_size,
            )),
            get_registration: Arc::new(GetRegistrationHandler::new(lifecycle.clone())),
            lifecycle,
        }
    }

    /// Shared lifecycle, for callers that need to lock or cancel directly.
    pub fn lifecycle(&self) -> &Arc<RegistrationLifecycle> {
        &self.lifecycle
    }
}
