//! PostgreSQL implementation of SessionStore.
//!
//! Each capacity change is a single conditional UPDATE on the session row.
//! Row-level locking inside PostgreSQL serializes concurrent writers of the
//! same session while leaving other sessions untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, Timestamp, TrainingSessionId,
};
use crate::domain::session::{CapacityError, TrainingSession};
use crate::ports::SessionStore;

/// PostgreSQL implementation of the SessionStore port.
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Creates a new PostgresSessionStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Works out why a conditional update touched no row.
    async fn classify_denial(&self, id: TrainingSessionId) -> CapacityError {
        let row: Result<Option<(bool, i32, i32)>, sqlx::Error> = sqlx::query_as(
            "SELECT is_open, current_participants, max_participants FROM training_sessions WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(None) => CapacityError::not_found(id),
            Ok(Some((false, _, _))) => CapacityError::session_closed(id),
            Ok(Some((true, _, _))) => CapacityError::session_full(id),
            Err(e) => CapacityError::infrastructure(format!("Failed to read session: {}", e)),
        }
    }

    async fn exists(&self, id: TrainingSessionId) -> Result<bool, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM training_sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// Database row representation of a training session.
#[derive(Debug, sqlx::FromRow)]
struct TrainingSessionRow {
    id: Uuid,
    course_title: String,
    location: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    prices: serde_json::Value,
    max_participants: i32,
    current_participants: i32,
    is_open: bool,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TrainingSessionRow> for TrainingSession {
    type Error = DomainError;

    fn try_from(row: TrainingSessionRow) -> Result<Self, Self::Error> {
        Ok(TrainingSession::reconstitute(
            TrainingSessionId::from_uuid(row.id),
            row.course_title,
            row.location,
            Timestamp::from_datetime(row.starts_at),
            Timestamp::from_datetime(row.ends_at),
            prices_from_json(row.prices)?,
            to_u32("max_participants", row.max_participants)?,
            to_u32("current_participants", row.current_participants)?,
            row.is_open,
            Timestamp::from_datetime(row.created_at),
            row.closed_at.map(Timestamp::from_datetime),
        ))
    }
}

fn prices_to_json(prices: &BTreeMap<Currency, Money>) -> serde_json::Value {
    let map: BTreeMap<&'static str, i64> = prices
        .iter()
        .map(|(currency, money)| (currency.code(), money.minor_units()))
        .collect();
    serde_json::json!(map)
}

fn prices_from_json(value: serde_json::Value) -> Result<BTreeMap<Currency, Money>, DomainError> {
    let raw: BTreeMap<String, i64> = serde_json::from_value(value).map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid prices value: {}", e))
    })?;

    raw.into_iter()
        .map(|(code, minor)| {
            let currency: Currency = code.parse().map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid currency: {}", e))
            })?;
            Ok((currency, Money::from_minor(minor, currency)))
        })
        .collect()
}

fn to_u32(field: &str, value: i32) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value: {}", field, value),
        )
    })
}

fn to_i32(field: &str, value: u32) -> Result<i32, DomainError> {
    i32::try_from(value).map_err(|_| {
        DomainError::validation(field, format!("{} value {} is too large to store", field, value))
    })
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn insert(&self, session: &TrainingSession) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO training_sessions (
                id, course_title, location, starts_at, ends_at, prices,
                max_participants, current_participants, is_open, created_at, closed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.course_title())
        .bind(session.location())
        .bind(session.starts_at().as_datetime())
        .bind(session.ends_at().as_datetime())
        .bind(prices_to_json(session.prices()))
        .bind(to_i32("max_participants", session.max_participants())?)
        .bind(to_i32("current_participants", session.current_participants())?)
        .bind(session.is_open())
        .bind(session.created_at().as_datetime())
        .bind(session.closed_at().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to save training session", e))?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: TrainingSessionId,
    ) -> Result<Option<TrainingSession>, DomainError> {
        let row: Option<TrainingSessionRow> = sqlx::query_as(
            r#"
            SELECT id, course_title, location, starts_at, ends_at, prices,
                   max_participants, current_participants, is_open, created_at, closed_at
            FROM training_sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find training session", e))?;

        row.map(TrainingSession::try_from).transpose()
    }

    async fn try_reserve(&self, id: TrainingSessionId) -> Result<(), CapacityError> {
        let result = sqlx::query(
            r#"
            UPDATE training_sessions
            SET current_participants = current_participants + 1
            WHERE id = $1
              AND is_open
              AND current_participants < max_participants
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| CapacityError::infrastructure(format!("Failed to reserve seat: {}", e)))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        Err(self.classify_denial(id).await)
    }

    async fn release(&self, id: TrainingSessionId) -> Result<bool, CapacityError> {
        let result = sqlx::query(
            r#"
            UPDATE training_sessions
            SET current_participants = current_participants - 1
            WHERE id = $1
              AND current_participants > 0
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| CapacityError::infrastructure(format!("Failed to release seat: {}", e)))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.exists(id).await {
            Ok(true) => Ok(false),
            Ok(false) => Err(CapacityError::not_found(id)),
            Err(e) => Err(CapacityError::infrastructure(format!(
                "Failed to read session: {}",
                e
            ))),
        }
    }

    async fn close(&self, id: TrainingSessionId, now: Timestamp) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE training_sessions SET is_open = FALSE, closed_at = $2 WHERE id = $1 AND is_open",
        )
        .bind(id.as_uuid())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to close training session", e))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        let exists = self
            .exists(id)
            .await
            .map_err(|e| DomainError::database("Failed to read training session", e))?;
        if exists {
            Ok(false)
        } else {
            Err(DomainError::new(
                ErrorCode::TrainingSessionNotFound,
                format!("Training session not found: {}", id),
            ))
        }
    }

    async fn close_ended(&self, now: Timestamp) -> Result<Vec<TrainingSessionId>, DomainError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE training_sessions
            SET is_open = FALSE, closed_at = $1
            WHERE is_open
              AND ends_at < $1
            RETURNING id
            "#,
        )
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to close ended sessions", e))?;

        Ok(rows
            .into_iter()
            .map(|(id,)| TrainingSessionId::from_uuid(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_survive_json_encoding() {
        let mut prices = BTreeMap::new();
        prices.insert(Currency::Eur, Money::from_major(1000, Currency::Eur));
        prices.insert(Currency::Chf, Money::from_minor(95_050, Currency::Chf));

        let json = prices_to_json(&prices);
        assert_eq!(json["EUR"], 100_000);
        assert_eq!(prices_from_json(json).unwrap(), prices);
    }

    #[test]
    fn rejects_unknown_currency_in_storage() {
        let json = serde_json::json!({ "XYZ": 100 });
        assert!(prices_from_json(json).is_err());
    }

    #[test]
    fn rejects_negative_counters() {
        assert!(to_u32("current_participants", -1).is_err());
        assert_eq!(to_u32("current_participants", 3).unwrap(), 3);
    }

    #[test]
    fn rejects_counters_beyond_the_column_range() {
        let err = to_i32("max_participants", u32::MAX).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(to_i32("max_participants", i32::MAX as u32).unwrap(), i32::MAX);
    }
}
