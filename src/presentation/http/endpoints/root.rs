use std::sync::Arc;

use poem_openapi::Tags;

use crate::{
    application::usecases::{
        cancel_message::CancelMessageUseCase, get_message::GetMessageUseCase,
        list_channels::ListChannelsUseCase, list_messages::ListMessagesUseCase,
        schedule_message::ScheduleMessageUseCase,
    },
    domain::errors::DomainError,
};

#[derive(Clone)]
pub struct ApiState {
    pub schedule_message_usecase: Arc<ScheduleMessageUseCase>,
    pub cancel_message_usecase: Arc<CancelMessageUseCase>,
    pub list_messages_usecase: Arc<ListMessagesUseCase>,
    pub get_message_usecase: Arc<GetMessageUseCase>,
    pub list_channels_usecase: Arc<ListChannelsUseCase>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Messages,
    Channels,
}

/// Synchronous API errors only; delivery-time failures are recorded on the
/// row and surface through list/get.
pub fn map_domain_error(err: DomainError) -> poem::Error {
    use poem::http::StatusCode;

    let status = match &err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) | DomainError::InvalidTransition(_) => StatusCode::CONFLICT,
        DomainError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    poem::Error::from_string(err.to_string(), status)
}
