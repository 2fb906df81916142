use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Revoked,
}

/// Slack workspace token belonging to one owner. Acquisition and refresh
/// happen outside this service; we only look up the active token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackCredential {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub access_token: String,
    pub team_name: Option<String>,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
