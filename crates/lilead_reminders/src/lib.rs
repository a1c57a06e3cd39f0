//! Reminder scheduling and push delivery for Lilead
//!
//! - [`ReminderDispatcher`] runs a single tick: due scan, delivery to every
//!   device of the reminder's owner, token cleanup and mark-sent.
//! - [`ReminderScheduler`] runs the dispatcher periodically and owns the
//!   start/stop lifecycle of that loop.
//!
//! Both are generic over the store and gateway traits so they can be driven
//! by the SQL repositories and FCM in production and by in-memory fakes in
//! tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use lilead_db::{DbClient, SqlDeviceTokenRepository, SqlReminderRepository};
//! use lilead_firebase::FcmPushGateway;
//! use lilead_reminders::{DispatcherSettings, ReminderDispatcher, ReminderScheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! async fn run(db: DbClient) {
//!     let dispatcher = ReminderDispatcher::new(
//!         Arc::new(SqlReminderRepository::new(db.clone())),
//!         Arc::new(SqlDeviceTokenRepository::new(db)),
//!         Arc::new(FcmPushGateway::from_config(None).await),
//!         DispatcherSettings::default(),
//!     );
//!     let scheduler = ReminderScheduler::new(Arc::new(dispatcher), Duration::from_secs(60));
//!     scheduler.start().await;
//! }
//! ```

pub mod dispatcher;
pub mod payload;
pub mod scheduler;

pub use dispatcher::{
    DispatchError, DispatcherSettings, ReminderDispatcher, ReminderOutcome, TickReport,
};
pub use payload::{build_reminder_payload, truncate_body, REMINDER_TITLE};
pub use scheduler::{ReminderScheduler, SchedulerError};
