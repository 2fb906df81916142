use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{Channel, SlackCredential};

/// Delivery failures split into the two classes the worker acts on: retryable
/// errors re-enter the due queue with backoff, permanent errors fail the row
/// outright.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("retryable provider error: {0}")]
    Retryable(String),
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Provider-side message timestamp (Slack's `ts`).
    pub message_ts: String,
    pub channel_id: String,
}

/// External collaborator wrapping the messaging API. The core is agnostic to
/// the wire protocol; every non-success outcome must already be classified.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn deliver(
        &self,
        credential: &SlackCredential,
        channel_id: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, ProviderError>;

    async fn list_channels(
        &self,
        credential: &SlackCredential,
    ) -> Result<Vec<Channel>, ProviderError>;
}
