// --- File: crates/lilead_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error handling
pub mod logging; // Logging utilities
pub mod models; // Data structures shared across crates

// Re-export error types and utilities for easier access
pub use error::{database_error, validation_error, HttpStatusCode, LileadError};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_error, log_result};

pub use models::{DeviceToken, NotificationPayload, Platform, Reminder, UnknownPlatform};
