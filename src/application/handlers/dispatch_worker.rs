use std::sync::Arc;

use crate::{
    application::services::{
        clock::Clock,
        provider::{DeliveryReceipt, ProviderClient, ProviderError},
        retry::RetryPolicy,
    },
    domain::{
        errors::DomainResult,
        models::ScheduledMessage,
        repositories::{CredentialRepository, ScheduledMessageStore},
    },
};

/// Executes a single claimed (`Dispatching`) row: one provider call, then a
/// transition to `Sent`, `Failed`, or back to `Pending` with backoff.
pub struct DispatchWorker {
    store: Arc<dyn ScheduledMessageStore>,
    credentials: Arc<dyn CredentialRepository>,
    provider: Arc<dyn ProviderClient>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl DispatchWorker {
    pub fn new(
        store: Arc<dyn ScheduledMessageStore>,
        credentials: Arc<dyn CredentialRepository>,
        provider: Arc<dyn ProviderClient>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            credentials,
            provider,
            clock,
            policy,
        }
    }

    pub async fn handle(&self, message: ScheduledMessage) -> DomainResult<()> {
        let attempt = message.attempts + 1;

        match self.attempt_delivery(&message).await {
            Ok(receipt) => {
                tracing::info!(
                    message_id = %message.id,
                    channel = %receipt.channel_id,
                    ts = %receipt.message_ts,
                    attempt,
                    "message delivered"
                );
                self.store
                    .mark_sent(message.id, self.clock.now(), attempt)
                    .await
            }
            Err(ProviderError::Permanent(reason)) => {
                tracing::warn!(
                    message_id = %message.id,
                    attempt,
                    %reason,
                    "permanent delivery failure"
                );
                self.store.mark_failed(message.id, &reason, attempt).await
            }
            Err(ProviderError::Retryable(reason)) if self.policy.exhausted(attempt) => {
                tracing::warn!(
                    message_id = %message.id,
                    attempt,
                    %reason,
                    "retry budget exhausted"
                );
                self.store.mark_failed(message.id, &reason, attempt).await
            }
            Err(ProviderError::Retryable(reason)) => {
                let next_at = self.clock.now() + self.policy.backoff(attempt);
                tracing::info!(
                    message_id = %message.id,
                    attempt,
                    %reason,
                    next_at = %next_at,
                    "delivery will be retried"
                );
                self.store
                    .reschedule(message.id, next_at, attempt, &reason)
                    .await
            }
        }
    }

    async fn attempt_delivery(
        &self,
        message: &ScheduledMessage,
    ) -> Result<DeliveryReceipt, ProviderError> {
        let credential = self
            .credentials
            .find_active(message.owner_id)
            .await
            .map_err(|err| ProviderError::Retryable(format!("credential lookup failed: {err}")))?
            .ok_or_else(|| {
                ProviderError::Permanent("no active Slack credential for owner".to_string())
            })?;

        let delivery = self
            .provider
            .deliver(&credential, &message.channel_id, &message.body);

        match tokio::time::timeout(self.policy.attempt_timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Retryable(format!(
                "delivery timed out after {:?}",
                self.policy.attempt_timeout
            ))),
        }
    }
}
