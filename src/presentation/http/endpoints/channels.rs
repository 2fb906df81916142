use std::sync::Arc;

use poem_openapi::{OpenApi, param::Query, payload::Json};
use uuid::Uuid;

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags, map_domain_error},
    mappers::map_channel,
    responses::ChannelDto,
};

#[derive(Clone)]
pub struct ChannelsEndpoints {
    state: Arc<ApiState>,
}

impl ChannelsEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl ChannelsEndpoints {
    #[oai(
        path = "/channels",
        method = "get",
        tag = EndpointsTags::Channels,
    )]
    pub async fn list_channels(
        &self,
        owner_id: Query<Uuid>,
    ) -> poem::Result<Json<Vec<ChannelDto>>> {
        let channels = self
            .state
            .list_channels_usecase
            .execute(owner_id.0)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(channels.iter().map(map_channel).collect()))
    }
}
