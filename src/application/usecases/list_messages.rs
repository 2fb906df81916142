use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    errors::DomainResult,
    models::{MessageStatus, ScheduledMessage},
    repositories::ScheduledMessageStore,
};

pub struct ListMessagesUseCase {
    store: Arc<dyn ScheduledMessageStore>,
}

impl ListMessagesUseCase {
    pub fn new(store: Arc<dyn ScheduledMessageStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        owner_id: Uuid,
        status: Option<MessageStatus>,
    ) -> DomainResult<Vec<ScheduledMessage>> {
        self.store.list_by_owner(owner_id, status).await
    }
}
