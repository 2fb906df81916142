use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{
    OpenApi,
    param::{Path, Query},
    payload::Json,
};
use uuid::Uuid;

use crate::{
    application::usecases::{
        cancel_message::CancelMessageRequest, schedule_message::ScheduleMessageRequest,
    },
    presentation::{
        http::{
            endpoints::root::{ApiState, EndpointsTags, map_domain_error},
            mappers::map_message,
            requests::{CancelMessageRequestDto, ScheduleMessageRequestDto},
            responses::{
                CancelMessageResponseDto, ScheduleMessageResponseDto, ScheduledMessageDto,
            },
        },
        models::MessageStatusKind,
    },
};

#[derive(Clone)]
pub struct MessagesEndpoints {
    state: Arc<ApiState>,
}

impl MessagesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl MessagesEndpoints {
    /// Persists the message and returns immediately; delivery happens on a
    /// later scheduler tick.
    #[oai(
        path = "/messages",
        method = "post",
        tag = EndpointsTags::Messages,
    )]
    pub async fn schedule_message(
        &self,
        request: Json<ScheduleMessageRequestDto>,
    ) -> PoemResult<Json<ScheduleMessageResponseDto>> {
        let payload = ScheduleMessageRequest {
            owner_id: request.owner_id,
            channel_id: request.channel_id.clone(),
            text: request.text.clone(),
            scheduled_at: request.scheduled_at,
        };

        let response = self
            .state
            .schedule_message_usecase
            .execute(payload)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(ScheduleMessageResponseDto {
            message_id: response.message_id,
        }))
    }

    #[oai(
        path = "/messages",
        method = "get",
        tag = EndpointsTags::Messages,
    )]
    pub async fn list_messages(
        &self,
        owner_id: Query<Uuid>,
        status: Query<Option<MessageStatusKind>>,
    ) -> PoemResult<Json<Vec<ScheduledMessageDto>>> {
        let messages = self
            .state
            .list_messages_usecase
            .execute(owner_id.0, status.0.map(Into::into))
            .await
            .map_err(map_domain_error)?;

        Ok(Json(messages.iter().map(map_message).collect()))
    }

    #[oai(
        path = "/messages/:message_id",
        method = "get",
        tag = EndpointsTags::Messages,
    )]
    pub async fn get_message(
        &self,
        message_id: Path<Uuid>,
        owner_id: Query<Uuid>,
    ) -> PoemResult<Json<ScheduledMessageDto>> {
        let message = self
            .state
            .get_message_usecase
            .execute(message_id.0, owner_id.0)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(map_message(&message)))
    }

    /// Cancels a still-pending message. Returns 409 once dispatch has begun.
    #[oai(
        path = "/messages/:message_id",
        method = "delete",
        tag = EndpointsTags::Messages,
    )]
    pub async fn cancel_message(
        &self,
        message_id: Path<Uuid>,
        request: Json<CancelMessageRequestDto>,
    ) -> PoemResult<Json<CancelMessageResponseDto>> {
        self.state
            .cancel_message_usecase
            .execute(CancelMessageRequest {
                owner_id: request.owner_id,
                message_id: message_id.0,
            })
            .await
            .map_err(map_domain_error)?;

        Ok(Json(CancelMessageResponseDto { ok: true }))
    }
}
