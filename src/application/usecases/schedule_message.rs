use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    errors::DomainResult,
    models::NewScheduledMessage,
    repositories::ScheduledMessageStore,
};

pub struct ScheduleMessageUseCase {
    store: Arc<dyn ScheduledMessageStore>,
}

pub struct ScheduleMessageRequest {
    pub owner_id: Uuid,
    pub channel_id: String,
    pub text: String,
    pub scheduled_at: DateTime<Utc>,
}

pub struct ScheduleMessageResponse {
    pub message_id: Uuid,
}

impl ScheduleMessageUseCase {
    pub fn new(store: Arc<dyn ScheduledMessageStore>) -> Self {
        Self { store }
    }

    /// Persists a `Pending` row and returns immediately; delivery happens on
    /// a later scheduler tick. A `scheduled_at` in the past is accepted and
    /// becomes due on the next tick.
    pub async fn execute(
        &self,
        request: ScheduleMessageRequest,
    ) -> DomainResult<ScheduleMessageResponse> {
        let draft = NewScheduledMessage {
            owner_id: request.owner_id,
            channel_id: request.channel_id,
            body: request.text,
            scheduled_at: request.scheduled_at,
        };

        let message = self.store.insert(draft).await?;

        tracing::info!(
            message_id = %message.id,
            owner_id = %message.owner_id,
            scheduled_at = %message.scheduled_at,
            "message scheduled"
        );

        Ok(ScheduleMessageResponse {
            message_id: message.id,
        })
    }
}
