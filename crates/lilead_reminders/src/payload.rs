use lilead_common::{NotificationPayload, Reminder};
use std::collections::HashMap;

pub const REMINDER_TITLE: &str = "🔔 Lead Reminder";

/// Longest body, in characters, before truncation.
pub const MAX_BODY_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Cuts `content` to [`MAX_BODY_CHARS`] characters, appending `...` when anything was dropped.
pub fn truncate_body(content: &str) -> String {
    match content.char_indices().nth(MAX_BODY_CHARS) {
        Some((byte_index, _)) => format!("{}{}", &content[..byte_index], ELLIPSIS),
        None => content.to_string(),
    }
}

/// Notification announcing that `reminder` is due.
pub fn build_reminder_payload(reminder: &Reminder) -> NotificationPayload {
    let data = HashMap::from([
        ("type".to_string(), "reminder".to_string()),
        ("noteId".to_string(), reminder.id.clone()),
        ("leadId".to_string(), reminder.lead_id.clone()),
    ]);

    NotificationPayload {
        title: REMINDER_TITLE.to_string(),
        body: truncate_body(&reminder.content),
        data,
    }
}
