//! SQL implementation of the reminder repository, backed by the `notes` table

use crate::error::DbError;
use crate::repositories::reminder::ReminderRepository;
use crate::repositories::{from_millis, to_millis};
use crate::DbClient;
use chrono::{DateTime, Utc};
use lilead_common::models::Reminder;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

/// SQL implementation of the reminder repository
#[derive(Debug, Clone)]
pub struct SqlReminderRepository {
    /// The database client
    db_client: DbClient,
}

impl SqlReminderRepository {
    /// Create a new SQL reminder repository
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn map_row(row: &AnyRow) -> Result<Reminder, DbError> {
        let reminder_at: Option<i64> = row.try_get("reminder_at")?;
        let reminder_sent: i64 = row.try_get("reminder_sent")?;

        Ok(Reminder {
            id: row.try_get("id")?,
            lead_id: row.try_get("lead_id")?,
            user_id: row.try_get("user_id")?,
            content: row.try_get("content")?,
            reminder_at: reminder_at.map(from_millis).transpose()?,
            reminder_sent: reminder_sent != 0,
        })
    }

    /// Insert a note carrying a reminder.
    ///
    /// Notes are normally written by the lead CRUD surface; this is used for
    /// seeding and tests.
    pub async fn insert(&self, reminder: &Reminder) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO notes (id, lead_id, user_id, content, reminder_at, reminder_sent)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
        )
        .bind(&reminder.id)
        .bind(&reminder.lead_id)
        .bind(&reminder.user_id)
        .bind(&reminder.content)
        .bind(reminder.reminder_at.map(to_millis))
        .bind(i64::from(reminder.reminder_sent))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to insert note: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        Ok(())
    }

    /// Load a note's reminder state by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Reminder>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, lead_id, user_id, content, reminder_at, reminder_sent
            FROM notes
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

impl ReminderRepository for SqlReminderRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing notes schema");

        self.db_client
            .execute(
                r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                lead_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                reminder_at BIGINT,
                reminder_sent BIGINT NOT NULL DEFAULT 0
            )
        "#,
            )
            .await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_notes_due ON notes (reminder_sent, reminder_at)",
            )
            .await?;

        info!("Notes schema initialized successfully");
        Ok(())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, lead_id, user_id, content, reminder_at, reminder_sent
            FROM notes
            WHERE reminder_at IS NOT NULL
              AND reminder_at <= $1
              AND reminder_sent = 0
            ORDER BY reminder_at, id
        "#,
        )
        .bind(to_millis(now))
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to query due reminders: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        debug!("Found {} due reminders", rows.len());
        rows.iter().map(Self::map_row).collect()
    }

    async fn mark_sent(&self, reminder_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE notes SET reminder_sent = 1 WHERE id = $1 AND reminder_sent = 0",
        )
        .bind(reminder_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to mark reminder {} as sent: {}", reminder_id, e);
            DbError::QueryError(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }
}
