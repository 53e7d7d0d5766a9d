use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    NewRequest,
    ThesisBorrowed,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewRequest => "new_request",
            Self::ThesisBorrowed => "thesis_borrowed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminNotification {
    pub event_type: NotificationEvent,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}
