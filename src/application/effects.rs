//! Post-transition side effects.
//!
//! Builds the outbox entry for a transition marker: the notification, its
//! template data and, where the transition calls for one, the rendered
//! document. Rendering is pure, so the entry is ready before the transition
//! commits and is written in the same atomic step.

use std::sync::Arc;

use serde_json::json;

use crate::domain::billing::AmountBreakdown;
use crate::domain::foundation::Timestamp;
use crate::domain::registration::{Registration, TransitionMarker};
use crate::domain::session::TrainingSession;
use crate::ports::{DocumentRenderer, Notification, NotificationOutboxEntry};

use super::BillingPolicy;

/// Turns committed transitions into queued notifications.
#[derive(Clone)]
pub struct TransitionEffects {
    renderer: Arc<dyn DocumentRenderer>,
    billing: BillingPolicy,
}

impl TransitionEffects {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, billing: BillingPolicy) -> Self {
        Self { renderer, billing }
    }

    pub fn billing(&self) -> &BillingPolicy {
        &self.billing
    }

    /// The outbox entry announcing `marker` for this registration.
    ///
    /// A document that fails to render is logged and left off; the
    /// notification still goes out.
    pub fn outbox_entry(
        &self,
        registration: &Registration,
        session: &TrainingSession,
        amounts: AmountBreakdown,
        marker: TransitionMarker,
        now: Timestamp,
    ) -> NotificationOutboxEntry {
        let data = self.template_data(registration, session, &amounts);
        let mut notification =
            Notification::new(registration.learner().email(), marker.template(), data);

        if let Some(kind) = marker.document() {
            let doc_data = self
                .billing
                .document_data(session, registration, amounts, now);
            match self.renderer.render(kind, &doc_data) {
                Ok(doc) => notification = notification.with_attachment(doc.into()),
                Err(e) => tracing::error!(
                    registration_id = %registration.id(),
                    document = %kind,
                    error = %e,
                    "Document rendering failed; sending notification without it"
                ),
            }
        }

        NotificationOutboxEntry::new(registration.id(), marker, notification, now)
    }

    fn template_data(
        &self,
        registration: &Registration,
        session: &TrainingSession,
        amounts: &AmountBreakdown,
    ) -> serde_json::Value {
        let mut data = json!({
            "registration_id": registration.id().to_string(),
            "learner_name": registration.learner().full_name(),
            "course_title": session.course_title(),
            "location": session.location(),
            "starts_at": session.starts_at().format_datetime(),
            "ends_at": session.ends_at().format_datetime(),
            "currency": amounts.ttc.currency().code(),
            "amount_ht": amounts.ht.to_decimal_string(),
            "amount_vat": amounts.vat.to_decimal_string(),
            "amount_ttc": amounts.ttc.to_decimal_string(),
            "vat_rate": amounts.vat_rate.to_string(),
        });

        if let Some(quote) = registration.quote_number() {
            let bank = &self.billing.bank_details;
            data["quote_number"] = json!(quote.as_str());
            data["bank_account_holder"] = json!(bank.account_holder);
            data["bank_iban"] = json!(bank.iban);
            data["bank_bic"] = json!(bank.bic);
        }
        if let Some(reference) = registration.payment_reference() {
            data["payment_reference"] = json!(reference);
        }
        if let Some(reason) = registration.cancellation_reason() {
            data["cancellation_reason"] = json!(reason.describe());
        }
        data
    }
}
