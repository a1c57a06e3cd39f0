//! Reminder repository
//!
//! Reminders live on notes. The repository only exposes what the dispatcher
//! needs: the due scan and the one-way `reminder_sent` transition.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use lilead_common::models::Reminder;

/// Repository for note reminders
pub trait ReminderRepository: Send + Sync {
    /// Initialize the database schema
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Snapshot of every reminder with `reminder_at <= now` that has not been sent
    fn find_due(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Reminder>, DbError>> + Send;

    /// Flip `reminder_sent` to true
    ///
    /// Returns `true` when this call performed the transition and `false` when
    /// the reminder was already sent or no longer exists. Neither case is an
    /// error, so repeated calls are safe.
    fn mark_sent(
        &self,
        reminder_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;
}
