use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{
    application::services::provider::{DeliveryReceipt, ProviderClient, ProviderError},
    domain::models::{Channel, SlackCredential},
};

pub struct SlackClient {
    http: Client,
    base_url: String,
}

impl SlackClient {
    pub fn new(base_url: impl Into<String>) -> Arc<dyn ProviderClient> {
        Arc::new(Self {
            http: Client::builder()
                .user_agent("slack-scheduler/dispatch")
                .build()
                .expect("failed to build slack http client"),
            base_url: base_url.into(),
        }) as Arc<dyn ProviderClient>
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/api/{}", self.base_url, method)
    }
}

/// Maps a Slack API error string onto the two classes the worker understands.
/// Unknown codes default to retryable rather than silently dropping a send,
/// but are logged so classification rules can be extended.
fn classify_slack_error(code: &str) -> ProviderError {
    match code {
        "channel_not_found"
        | "is_archived"
        | "not_in_channel"
        | "invalid_auth"
        | "token_revoked"
        | "token_expired"
        | "account_inactive"
        | "missing_scope"
        | "msg_too_long"
        | "no_text"
        | "restricted_action" => ProviderError::Permanent(format!("slack: {code}")),
        "ratelimited" | "rate_limited" | "service_unavailable" | "internal_error"
        | "fatal_error" | "request_timeout" => ProviderError::Retryable(format!("slack: {code}")),
        other => {
            tracing::warn!(code = other, "unclassified slack error, treating as retryable");
            ProviderError::Retryable(format!("slack: {other}"))
        }
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Retryable(format!("slack transport error: {err}"))
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
    channel: Option<String>,
}

#[derive(Deserialize)]
struct ConversationsListResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<SlackChannel>,
}

#[derive(Deserialize)]
struct SlackChannel {
    id: String,
    name: Option<String>,
    #[serde(default)]
    is_private: bool,
}

#[async_trait]
impl ProviderClient for SlackClient {
    async fn deliver(
        &self,
        credential: &SlackCredential,
        channel_id: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, ProviderError> {
        let response = self
            .http
            .post(self.method_url("chat.postMessage"))
            .bearer_auth(&credential.access_token)
            .json(&json!({ "channel": channel_id, "text": text }))
            .send()
            .await
            .map_err(transport_error)?;

        let body: PostMessageResponse = response.json().await.map_err(transport_error)?;

        if !body.ok {
            let code = body.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(classify_slack_error(&code));
        }

        Ok(DeliveryReceipt {
            message_ts: body.ts.unwrap_or_default(),
            channel_id: body.channel.unwrap_or_else(|| channel_id.to_string()),
        })
    }

    async fn list_channels(
        &self,
        credential: &SlackCredential,
    ) -> Result<Vec<Channel>, ProviderError> {
        let response = self
            .http
            .get(self.method_url("conversations.list"))
            .bearer_auth(&credential.access_token)
            .query(&[
                ("exclude_archived", "true"),
                ("types", "public_channel,private_channel"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let body: ConversationsListResponse = response.json().await.map_err(transport_error)?;

        if !body.ok {
            let code = body.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(classify_slack_error(&code));
        }

        Ok(body
            .channels
            .into_iter()
            .map(|channel| Channel {
                id: channel.id,
                name: channel.name.unwrap_or_else(|| "unnamed".to_string()),
                is_private: channel.is_private,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_codes_are_not_retried() {
        for code in ["channel_not_found", "token_revoked", "msg_too_long"] {
            assert!(matches!(
                classify_slack_error(code),
                ProviderError::Permanent(_)
            ));
        }
    }

    #[test]
    fn transient_codes_are_retried() {
        for code in ["ratelimited", "service_unavailable", "internal_error"] {
            assert!(matches!(
                classify_slack_error(code),
                ProviderError::Retryable(_)
            ));
        }
    }

    #[test]
    fn unknown_codes_default_to_retryable() {
        assert!(matches!(
            classify_slack_error("some_future_error"),
            ProviderError::Retryable(_)
        ));
    }
}
