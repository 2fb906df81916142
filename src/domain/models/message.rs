use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slack caps `chat.postMessage` text at 40k characters.
pub const MAX_BODY_LEN: usize = 40_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Dispatching,
    Sent,
    Failed,
    Cancelled,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Dispatching => "dispatching",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MessageStatus::Pending),
            "dispatching" => Some(MessageStatus::Dispatching),
            "sent" => Some(MessageStatus::Sent),
            "failed" => Some(MessageStatus::Failed),
            "cancelled" => Some(MessageStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub channel_id: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub attempts: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert draft for a scheduled message; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewScheduledMessage {
    pub owner_id: Uuid,
    pub channel_id: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
}

impl NewScheduledMessage {
    /// A `scheduled_at` in the past is accepted and treated as due
    /// immediately; the next tick picks it up.
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_id.trim().is_empty() {
            return Err("channel_id must not be empty".to_string());
        }
        if self.body.trim().is_empty() {
            return Err("body must not be empty".to_string());
        }
        if self.body.chars().count() > MAX_BODY_LEN {
            return Err(format!("body exceeds {MAX_BODY_LEN} characters"));
        }
        Ok(())
    }
}
