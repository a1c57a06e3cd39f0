// --- File: crates/lilead_common/src/models.rs ---

// Data structures shared between the stores, the push gateway and the
// reminder dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Client platform a push token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a platform string is not one of `ios`, `android` or `web`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform '{0}', expected one of ios, android, web")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

/// Represents a push token registered by one of a user's devices
///
/// The token itself is the identity: registering a known token again
/// overwrites its owner and platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    /// The provider-issued push token
    pub token: String,

    /// The user currently owning the token
    pub user_id: String,

    /// The platform the token was issued for
    pub platform: Platform,

    /// The timestamp of the last registration
    pub updated_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>, platform: Platform) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            platform,
            updated_at: Utc::now(),
        }
    }
}

/// A note-level reminder belonging to a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Id of the note carrying the reminder
    pub id: String,
    pub lead_id: String,
    pub user_id: String,
    pub content: String,
    pub reminder_at: Option<DateTime<Utc>>,
    pub reminder_sent: bool,
}

impl Reminder {
    /// A reminder is due once its time has passed and it has not been sent.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.reminder_sent && self.reminder_at.is_some_and(|at| at <= now)
    }
}

/// Notification content handed to the push gateway. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}
