use crate::{
    domain::models::{Channel, ScheduledMessage},
    presentation::{
        http::responses::{ChannelDto, ScheduledMessageDto},
        models::MessageStatusKind,
    },
};

pub fn map_message(message: &ScheduledMessage) -> ScheduledMessageDto {
    ScheduledMessageDto {
        id: message.id,
        channel_id: message.channel_id.clone(),
        body: message.body.clone(),
        status: MessageStatusKind::from(message.status),
        attempts: message.attempts,
        scheduled_at: message.scheduled_at.to_rfc3339(),
        sent_at: message.sent_at.map(|t| t.to_rfc3339()),
        last_error: message.last_error.clone(),
        created_at: message.created_at.to_rfc3339(),
        updated_at: message.updated_at.to_rfc3339(),
    }
}

pub fn map_channel(channel: &Channel) -> ChannelDto {
    ChannelDto {
        id: channel.id.clone(),
        name: channel.name.clone(),
        is_private: channel.is_private,
    }
}
