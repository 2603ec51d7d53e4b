//! PostgreSQL implementation of NotificationOutbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, RegistrationId, Timestamp};
use crate::ports::{
    Attachment, EnqueueResult, Notification, NotificationOutbox, NotificationOutboxEntry,
};

const ENTRY_COLUMNS: &str = r#"
    id, registration_id, marker, recipient, template, data,
    attachment_filename, attachment_content_type, attachment_bytes,
    status, attempts, next_attempt_at, last_error, created_at, delivered_at
"#;

/// PostgreSQL implementation of the NotificationOutbox port.
pub struct PostgresNotificationOutbox {
    pool: PgPool,
}

impl PostgresNotificationOutbox {
    /// Creates a new PostgresNotificationOutbox with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an outbox entry.
#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    registration_id: Uuid,
    marker: String,
    recipient: String,
    template: String,
    data: serde_json::Value,
    attachment_filename: Option<String>,
    attachment_content_type: Option<String>,
    attachment_bytes: Option<Vec<u8>>,
    status: String,
    attempts: i32,
    next_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for NotificationOutboxEntry {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid {} value: {}", field, e),
            )
        };

        let attachment = match (
            row.attachment_filename,
            row.attachment_content_type,
            row.attachment_bytes,
        ) {
            (Some(filename), Some(content_type), Some(bytes)) => Some(Attachment {
                filename,
                content_type,
                bytes,
            }),
            _ => None,
        };

        Ok(NotificationOutboxEntry {
            id: row.id,
            registration_id: RegistrationId::from_uuid(row.registration_id),
            marker: row.marker.parse().map_err(|e| corrupt("marker", &e))?,
            notification: Notification {
                recipient: row.recipient,
                template: row.template,
                data: row.data,
                attachment,
            },
            status: row.status.parse().map_err(|e| corrupt("status", &e))?,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt("attempts", &e))?,
            next_attempt_at: Timestamp::from_datetime(row.next_attempt_at),
            last_error: row.last_error,
            created_at: Timestamp::from_datetime(row.created_at),
            delivered_at: row.delivered_at.map(Timestamp::from_datetime),
        })
    }
}

/// Inserts an entry unless one exists for the same registration and marker.
///
/// Takes any executor so the registration repository can run it inside its
/// own transaction.
pub(super) async fn insert_entry<'e, E>(
    executor: E,
    entry: &NotificationOutboxEntry,
) -> Result<EnqueueResult, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let attachment = entry.notification.attachment.as_ref();
    let result = sqlx::query(
        r#"
        INSERT INTO notification_outbox (
            id, registration_id, marker, recipient, template, data,
            attachment_filename, attachment_content_type, attachment_bytes,
            status, attempts, next_attempt_at, last_error, created_at, delivered_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (registration_id, marker) DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(entry.registration_id.as_uuid())
    .bind(entry.marker.as_str())
    .bind(&entry.notification.recipient)
    .bind(&entry.notification.template)
    .bind(&entry.notification.data)
    .bind(attachment.map(|a| a.filename.clone()))
    .bind(attachment.map(|a| a.content_type.clone()))
    .bind(attachment.map(|a| a.bytes.clone()))
    .bind(entry.status.as_str())
    .bind(entry.attempts as i32)
    .bind(entry.next_attempt_at.as_datetime())
    .bind(&entry.last_error)
    .bind(entry.created_at.as_datetime())
    .bind(entry.delivered_at.map(|t| *t.as_datetime()))
    .execute(executor)
    .await?;

    Ok(if result.rows_affected() == 1 {
        EnqueueResult::Inserted
    } else {
        EnqueueResult::Duplicate
    })
}

#[async_trait]
impl NotificationOutbox for PostgresNotificationOutbox {
    async fn enqueue(&self, entry: &NotificationOutboxEntry) -> Result<EnqueueResult, DomainError> {
        insert_entry(&self.pool, entry)
            .await
            .map_err(|e| DomainError::database("Failed to enqueue notification", e))
    }

    async fn claim_due(
        &self,
        now: Timestamp,
        lease_secs: u64,
        limit: u32,
    ) -> Result<Vec<NotificationOutboxEntry>, DomainError> {
        let sql = format!(
            r#"
            UPDATE notification_outbox
            SET next_attempt_at = $2
            WHERE id IN (
                SELECT id FROM notification_outbox
                WHERE status = 'pending'
                  AND next_attempt_at <= $1
                ORDER BY next_attempt_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(now.as_datetime())
            .bind(now.plus_secs(lease_secs).as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to claim notifications", e))?;

        let mut entries: Vec<NotificationOutboxEntry> = rows
            .into_iter()
            .map(NotificationOutboxEntry::try_from)
            .collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        attempts: u32,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'delivered', attempts = $2, delivered_at = $3, last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts as i32)
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark notification delivered", e))?;

        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        attempts: u32,
        next_attempt_at: Timestamp,
        error: &str,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET attempts = $2, next_attempt_at = $3, last_error = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(attempts as i32)
        .bind(next_attempt_at.as_datetime())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to reschedule notification", e))?;

        Ok(())
    }

    async fn mark_dead(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'dead', attempts = $2, last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts as i32)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to dead-letter notification", e))?;

        Ok(())
    }

    async fn find_by_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Vec<NotificationOutboxEntry>, DomainError> {
        let sql = format!(
            "SELECT {} FROM notification_outbox WHERE registration_id = $1 ORDER BY created_at ASC",
            ENTRY_COLUMNS
        );

        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(registration_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to load notifications", e))?;

        rows.into_iter().map(NotificationOutboxEntry::try_from).collect()
    }
}
