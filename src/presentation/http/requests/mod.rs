use chrono::{DateTime, Utc};
use poem_openapi::Object;
use uuid::Uuid;

#[derive(Object, Debug)]
pub struct ScheduleMessageRequestDto {
    pub owner_id: Uuid,
    #[oai(validator(min_length = 1))]
    pub channel_id: String,
    #[oai(validator(min_length = 1, max_length = 40000))]
    pub text: String,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Object, Debug)]
pub struct CancelMessageRequestDto {
    pub owner_id: Uuid,
}
