//! Database integration for Lilead
//!
//! This crate provides a pooled database client built on SQLx's `Any` driver
//! and the two stores the reminder subsystem depends on:
//!
//! - the device registry ([`DeviceTokenRepository`]), mapping push tokens to
//!   users and platforms
//! - the reminder repository ([`ReminderRepository`]), scanning notes for due
//!   reminders and flipping their `reminder_sent` flag
//!
//! SQLite is enabled by default; PostgreSQL is available behind the
//! `postgres` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use lilead_db::{DbClient, DeviceTokenRepository, RepositoryFactory, SqlDeviceTokenRepository, SqlRepositoryFactory};
//!
//! async fn setup_db() -> Result<SqlDeviceTokenRepository, Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_url("sqlite://data/lilead.db").await?;
//!     let devices: SqlDeviceTokenRepository = SqlRepositoryFactory::new().create_repository(db_client);
//!     devices.init_schema().await?;
//!     Ok(devices)
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
pub mod repository;

// Re-export the client, error and factory trait for ease of use
pub use client::DbClient;
pub use error::DbError;
pub use repository::RepositoryFactory;

// Re-export the repositories module components for ease of use
pub use repositories::{
    DeviceTokenRepository, ReminderRepository, SqlDeviceTokenRepository, SqlReminderRepository,
    SqlRepositoryFactory,
};
