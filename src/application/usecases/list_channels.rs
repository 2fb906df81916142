use std::sync::Arc;

use uuid::Uuid;

use crate::{
    application::services::provider::ProviderClient,
    domain::{
        errors::{DomainError, DomainResult},
        models::Channel,
        repositories::CredentialRepository,
    },
};

pub struct ListChannelsUseCase {
    credentials: Arc<dyn CredentialRepository>,
    provider: Arc<dyn ProviderClient>,
}

impl ListChannelsUseCase {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            credentials,
            provider,
        }
    }

    pub async fn execute(&self, owner_id: Uuid) -> DomainResult<Vec<Channel>> {
        let credential = self
            .credentials
            .find_active(owner_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound("no active Slack credential for owner".to_string())
            })?;

        self.provider
            .list_channels(&credential)
            .await
            .map_err(|err| DomainError::Other(anyhow::anyhow!("{err}")))
    }
}
