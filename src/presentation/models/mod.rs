use poem_openapi::Enum;

use crate::domain::models::MessageStatus;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[oai(rename_all = "snake_case")]
pub enum MessageStatusKind {
    Pending,
    Dispatching,
    Sent,
    Failed,
    Cancelled,
}

impl From<MessageStatus> for MessageStatusKind {
    fn from(value: MessageStatus) -> Self {
        match value {
            MessageStatus::Pending => MessageStatusKind::Pending,
            MessageStatus::Dispatching => MessageStatusKind::Dispatching,
            MessageStatus::Sent => MessageStatusKind::Sent,
            MessageStatus::Failed => MessageStatusKind::Failed,
            MessageStatus::Cancelled => MessageStatusKind::Cancelled,
        }
    }
}

impl From<MessageStatusKind> for MessageStatus {
    fn from(value: MessageStatusKind) -> Self {
        match value {
            MessageStatusKind::Pending => MessageStatus::Pending,
            MessageStatusKind::Dispatching => MessageStatus::Dispatching,
            MessageStatusKind::Sent => MessageStatus::Sent,
            MessageStatusKind::Failed => MessageStatus::Failed,
            MessageStatusKind::Cancelled => MessageStatus::Cancelled,
        }
    }
}
