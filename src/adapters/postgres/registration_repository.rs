//! PostgreSQL implementation of RegistrationRepository and QuoteSequence.
//!
//! Updates are compare-and-swap on the `version` column. A notification
//! handed to `update` is inserted in the same transaction as the row change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, RegistrationId, Timestamp, TrainingSessionId,
};
use crate::domain::registration::{LearnerContact, Registration, RegistrationRecord};
use crate::ports::{NotificationOutboxEntry, QuoteSequence, RegistrationRepository};

use super::notification_outbox::insert_entry;

const REGISTRATION_COLUMNS: &str = r#"
    id, session_id, first_name, last_name, email, phone, company, currency,
    status, payment_method, payment_status, quote_number, payment_reference,
    cancellation_reason, effects_fired, created_at, updated_at, paid_at,
    cancelled_at, seat_release_pending, version
"#;

/// PostgreSQL implementation of the RegistrationRepository port.
pub struct PostgresRegistrationRepository {
    pool: PgPool,
}

impl PostgresRegistrationRepository {
    /// Creates a new PostgresRegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a registration.
#[derive(Debug, sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    session_id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    currency: String,
    status: String,
    payment_method: Option<String>,
    payment_status: String,
    quote_number: Option<String>,
    payment_reference: Option<String>,
    cancellation_reason: Option<String>,
    effects_fired: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    seat_release_pending: bool,
    version: i64,
}

fn corrupt(field: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value: {}", field, e),
    )
}

fn parse_optional<T: std::str::FromStr>(
    field: &str,
    value: Option<String>,
) -> Result<Option<T>, DomainError>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| v.parse::<T>().map_err(|e| corrupt(field, e)))
        .transpose()
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = DomainError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let learner = LearnerContact::new(
            row.first_name,
            row.last_name,
            row.email,
            row.phone,
            row.company,
        )
        .map_err(|e| corrupt("learner", e))?;

        Ok(Registration::reconstitute(RegistrationRecord {
            id: RegistrationId::from_uuid(row.id),
            session_id: TrainingSessionId::from_uuid(row.session_id),
            learner,
            currency: row.currency.parse().map_err(|e| corrupt("currency", e))?,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            payment_method: parse_optional("payment_method", row.payment_method)?,
            payment_status: row
                .payment_status
                .parse()
                .map_err(|e| corrupt("payment_status", e))?,
            quote_number: parse_optional("quote_number", row.quote_number)?,
            payment_reference: row.payment_reference,
            cancellation_reason: parse_optional("cancellation_reason", row.cancellation_reason)?,
            effects_fired: parse_optional("effects_fired", row.effects_fired)?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            seat_release_pending: row.seat_release_pending,
            version: u64::try_from(row.version).map_err(|e| corrupt("version", e))?,
        }))
    }
}

fn version_to_db(version: u64) -> Result<i64, DomainError> {
    i64::try_from(version).map_err(|e| corrupt("version", e))
}

#[async_trait]
impl RegistrationRepository for PostgresRegistrationRepository {
    async fn insert(&self, registration: &Registration) -> Result<(), DomainError> {
        let r = registration;
        sqlx::query(
            r#"
            INSERT INTO registrations (
                id, session_id, first_name, last_name, email, phone, company, currency,
                status, payment_method, payment_status, quote_number, payment_reference,
                cancellation_reason, effects_fired, created_at, updated_at, paid_at,
                cancelled_at, seat_release_pending, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            "#,
        )
        .bind(r.id().as_uuid())
        .bind(r.session_id().as_uuid())
        .bind(r.learner().first_name())
        .bind(r.learner().last_name())
        .bind(r.learner().email())
        .bind(r.learner().phone())
        .bind(r.learner().company())
        .bind(r.currency().code())
        .bind(r.status().as_str())
        .bind(r.payment_method().map(|m| m.as_str()))
        .bind(r.payment_status().as_str())
        .bind(r.quote_number().map(|q| q.as_str()))
        .bind(r.payment_reference())
        .bind(r.cancellation_reason().map(|c| c.as_str()))
        .bind(r.effects_fired().map(|m| m.as_str()))
        .bind(r.created_at().as_datetime())
        .bind(r.updated_at().as_datetime())
        .bind(r.paid_at().map(|t| *t.as_datetime()))
        .bind(r.cancelled_at().map(|t| *t.as_datetime()))
        .bind(r.seat_release_pending())
        .bind(version_to_db(r.version())?)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to save registration", e))?;

        Ok(())
    }

    async fn update(
        &self,
        registration: &Registration,
        expected_version: u64,
        notification: Option<&NotificationOutboxEntry>,
    ) -> Result<(), DomainError> {
        let r = registration;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE registrations SET
                status = $3,
                payment_method = $4,
                payment_status = $5,
                quote_number = $6,
                payment_reference = $7,
                cancellation_reason = $8,
                effects_fired = $9,
                updated_at = $10,
                paid_at = $11,
                cancelled_at = $12,
                seat_release_pending = $13,
                version = $14
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(r.id().as_uuid())
        .bind(version_to_db(expected_version)?)
        .bind(r.status().as_str())
        .bind(r.payment_method().map(|m| m.as_str()))
        .bind(r.payment_status().as_str())
        .bind(r.quote_number().map(|q| q.as_str()))
        .bind(r.payment_reference())
        .bind(r.cancellation_reason().map(|c| c.as_str()))
        .bind(r.effects_fired().map(|m| m.as_str()))
        .bind(r.updated_at().as_datetime())
        .bind(r.paid_at().map(|t| *t.as_datetime()))
        .bind(r.cancelled_at().map(|t| *t.as_datetime()))
        .bind(r.seat_release_pending())
        .bind(version_to_db(r.version())?)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to update registration", e))?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM registrations WHERE id = $1")
                    .bind(r.id().as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| DomainError::database("Failed to read registration", e))?;

            return Err(match exists {
                None => DomainError::new(
                    ErrorCode::RegistrationNotFound,
                    format!("Registration not found: {}", r.id()),
                ),
                Some((current,)) => DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "Registration {} is at version {}, expected {}",
                        r.id(),
                        current,
                        expected_version
                    ),
                ),
            });
        }

        if let Some(entry) = notification {
            insert_entry(&mut *tx, entry)
                .await
                .map_err(|e| DomainError::database("Failed to enqueue notification", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit registration", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: RegistrationId) -> Result<Option<Registration>, DomainError> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        );
        let row: Option<RegistrationRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find registration", e))?;

        row.map(Registration::try_from).transpose()
    }

    async fn find_stale(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM registrations
            WHERE status IN ('created', 'pending_payment')
              AND updated_at < $1
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find stale registrations", e))?;

        Ok(rows
            .into_iter()
            .map(|(id,)| RegistrationId::from_uuid(id))
            .collect())
    }

    async fn find_pending_seat_releases(
        &self,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM registrations
            WHERE seat_release_pending
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find pending seat releases", e))?;

        Ok(rows
            .into_iter()
            .map(|(id,)| RegistrationId::from_uuid(id))
            .collect())
    }
}

/// PostgreSQL implementation of the QuoteSequence port.
pub struct PostgresQuoteSequence {
    pool: PgPool,
}

impl PostgresQuoteSequence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuoteSequence for PostgresQuoteSequence {
    async fn next_value(&self, year: i32) -> Result<u64, DomainError> {
        let (value,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO quote_sequences (year, last_value) VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET last_value = quote_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to allocate quote number", e))?;

        u64::try_from(value).map_err(|e| corrupt("quote sequence", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_optional_handles_null_and_values() {
        let none: Option<crate::domain::registration::PaymentMethod> =
            parse_optional("payment_method", None).unwrap();
        assert!(none.is_none());

        let some: Option<crate::domain::registration::PaymentMethod> =
            parse_optional("payment_method", Some("card".to_string())).unwrap();
        assert_eq!(some, Some(crate::domain::registration::PaymentMethod::Card));

        let bad: Result<Option<crate::domain::registration::PaymentMethod>, _> =
            parse_optional("payment_method", Some("cash".to_string()));
        assert_eq!(bad.unwrap_err().code, ErrorCode::DatabaseError);
    }

    #[test]
    fn version_conversion_rejects_overflow() {
        assert_eq!(version_to_db(7).unwrap(), 7);
        assert!(version_to_db(u64::MAX).is_err());
    }
}
