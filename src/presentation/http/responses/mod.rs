use poem_openapi::Object;
use uuid::Uuid;

use crate::presentation::models::MessageStatusKind;

#[derive(Object)]
pub struct ScheduleMessageResponseDto {
    pub message_id: Uuid,
}

#[derive(Object)]
pub struct CancelMessageResponseDto {
    pub ok: bool,
}

#[derive(Object)]
pub struct ScheduledMessageDto {
    pub id: Uuid,
    pub channel_id: String,
    pub body: String,
    pub status: MessageStatusKind,
    pub attempts: u32,
    pub scheduled_at: String,
    pub sent_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Object)]
pub struct ChannelDto {
    pub id: String,
    pub name: String,
    pub is_private: bool,
}
