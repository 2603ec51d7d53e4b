//! Pricing and document data for registrations.
//!
//! The amount breakdown is computed here once per registration; the in-app
//! summary, the card capture and every document read the same figures.

use crate::domain::billing::{AmountBreakdown, BankTransferDetails, DocumentData, VatRate};
use crate::domain::foundation::Timestamp;
use crate::domain::registration::{Registration, RegistrationError};
use crate::domain::session::TrainingSession;

/// Tax rate and payee details applied to every registration.
#[derive(Debug, Clone)]
pub struct BillingPolicy {
    pub vat_rate: VatRate,
    pub bank_details: BankTransferDetails,
}

impl BillingPolicy {
    pub fn new(vat_rate: VatRate, bank_details: BankTransferDetails) -> Self {
        Self {
            vat_rate,
            bank_details,
        }
    }

    /// HT / VAT / TTC for a registration, priced in its own currency.
    pub fn amounts(
        &self,
        session: &TrainingSession,
        registration: &Registration,
    ) -> Result<AmountBreakdown, RegistrationError> {
        let price = session.price_for(registration.currency()).ok_or_else(|| {
            RegistrationError::price_unavailable(session.id(), registration.currency())
        })?;
        Ok(AmountBreakdown::compute(price, self.vat_rate))
    }

    /// Everything a receipt or quote prints.
    pub fn document_data(
        &self,
        session: &TrainingSession,
        registration: &Registration,
        amounts: AmountBreakdown,
        issued_at: Timestamp,
    ) -> DocumentData {
        let learner = registration.learner();
        DocumentData {
            registration_id: registration.id(),
            learner_name: learner.full_name(),
            learner_email: learner.email().to_string(),
            learner_company: learner.company().map(str::to_string),
            course_title: session.course_title().to_string(),
            location: session.location().to_string(),
            starts_at: session.starts_at(),
            ends_at: session.ends_at(),
            amounts,
            quote_number: registration.quote_number().cloned(),
            payment_reference: registration.payment_reference().map(str::to_string),
            bank_details: registration
                .quote_number()
                .map(|_| self.bank_details.clone()),
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, Money, RegistrationId};
    use crate::domain::registration::LearnerContact;
    use crate::domain::session::SessionDetails;
    use crate::domain::foundation::TrainingSessionId;

    fn policy() -> BillingPolicy {
        BillingPolicy::new(
            VatRate::from_fraction(0.20).unwrap(),
            BankTransferDetails {
                account_holder: "Acme Training".to_string(),
                iban: "FR76 3000 6000 0112 3456 7890 189".to_string(),
                bic: "AGRIFRPP".to_string(),
            },
        )
    }

    fn session() -> TrainingSession {
        let now = Timestamp::now();
        TrainingSession::create(
            TrainingSessionId::new(),
            SessionDetails {
                course_title: "Async Rust".to_string(),
                location: "Lyon".to_string(),
                starts_at: now.add_days(7),
                ends_at: now.add_days(8),
                prices: vec![Money::from_major(1000, Currency::Eur)],
                max_participants: 10,
            },
            now,
        )
        .unwrap()
    }

    fn registration(session: &TrainingSession, currency: Currency) -> Registration {
        Registration::create(
            RegistrationId::new(),
            session.id(),
            LearnerContact::new("Ada", "Lovelace", "ada@example.com", None, None).unwrap(),
            currency,
            Timestamp::now(),
        )
    }

    #[test]
    fn amounts_use_the_registration_currency() {
        let s = session();
        let amounts = policy().amounts(&s, &registration(&s, Currency::Eur)).unwrap();
        assert_eq!(amounts.ht.to_decimal_string(), "1000.00");
        assert_eq!(amounts.vat.to_decimal_string(), "200.00");
        assert_eq!(amounts.ttc.to_decimal_string(), "1200.00");

        let err = policy()
            .amounts(&s, &registration(&s, Currency::Usd))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::PriceUnavailable { .. }));
    }

    #[test]
    fn bank_details_only_appear_with_a_quote() {
        let s = session();
        let r = registration(&s, Currency::Eur);
        let policy = policy();
        let amounts = policy.amounts(&s, &r).unwrap();
        let data = policy.document_data(&s, &r, amounts, Timestamp::now());

        assert_eq!(data.learner_name, "Ada Lovelace");
        assert_eq!(data.course_title, "Async Rust");
        assert_eq!(data.amounts, amounts);
        assert!(data.bank_details.is_none());
    }
}
