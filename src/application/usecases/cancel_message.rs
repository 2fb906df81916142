use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{errors::DomainResult, repositories::ScheduledMessageStore};

pub struct CancelMessageUseCase {
    store: Arc<dyn ScheduledMessageStore>,
}

pub struct CancelMessageRequest {
    pub owner_id: Uuid,
    pub message_id: Uuid,
}

impl CancelMessageUseCase {
    pub fn new(store: Arc<dyn ScheduledMessageStore>) -> Self {
        Self { store }
    }

    /// Only `Pending` rows can be cancelled; once a row is claimed the
    /// dispatch runs to completion, so there is no race against an in-flight
    /// provider call.
    pub async fn execute(&self, request: CancelMessageRequest) -> DomainResult<()> {
        self.store
            .cancel(request.message_id, request.owner_id)
            .await?;

        tracing::info!(message_id = %request.message_id, "message cancelled");
        Ok(())
    }
}
