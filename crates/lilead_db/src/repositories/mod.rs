//! Repository modules for database access
//!
//! This module contains repository traits and their SQL implementations for
//! device tokens and note reminders.

pub mod device_token;
pub mod device_token_sql;
pub mod factory;
pub mod reminder;
pub mod reminder_sql;

use crate::error::DbError;
use chrono::{DateTime, TimeZone, Utc};

// Re-export the repositories and factory for ease of use
pub use device_token::DeviceTokenRepository;
pub use device_token_sql::SqlDeviceTokenRepository;
pub use factory::SqlRepositoryFactory;
pub use reminder::ReminderRepository;
pub use reminder_sql::SqlReminderRepository;

// Timestamps are stored as epoch milliseconds: DateTime<Utc> has no Decode
// impl for sqlx::Any, and integer comparison keeps the due scan index-friendly.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, DbError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DbError::CorruptRow(format!("timestamp out of range: {}", ms)))
}
