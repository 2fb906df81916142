use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::ScheduledMessage,
    repositories::ScheduledMessageStore,
};

pub struct GetMessageUseCase {
    store: Arc<dyn ScheduledMessageStore>,
}

impl GetMessageUseCase {
    pub fn new(store: Arc<dyn ScheduledMessageStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, message_id: Uuid, owner_id: Uuid) -> DomainResult<ScheduledMessage> {
        let message = self.store.get(message_id).await?;
        if message.owner_id != owner_id {
            return Err(DomainError::Forbidden(
                "message does not belong to owner".to_string(),
            ));
        }
        Ok(message)
    }
}
