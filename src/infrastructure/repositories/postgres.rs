use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, Pool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::{
        CredentialStatus, MessageStatus, NewScheduledMessage, ScheduledMessage, SlackCredential,
    },
    repositories::{CredentialRepository, ScheduledMessageStore},
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresScheduledMessageStore {
    pool: PgPool,
}

impl PostgresScheduledMessageStore {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    /// Reads the row's current status to turn a zero-row conditional update
    /// into the right error.
    async fn transition_conflict(&self, id: Uuid, target: &str) -> DomainError {
        match sqlx::query(r#"SELECT status FROM scheduled_messages WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(row)) => {
                let status: String = row.get("status");
                DomainError::InvalidTransition(format!("{status} -> {target}"))
            }
            Ok(None) => DomainError::NotFound(format!("scheduled message {id}")),
            Err(err) => err.into(),
        }
    }
}

#[async_trait]
impl ScheduledMessageStore for PostgresScheduledMessageStore {
    async fn insert(&self, draft: NewScheduledMessage) -> DomainResult<ScheduledMessage> {
        draft.validate().map_err(DomainError::Validation)?;

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_messages (
                id, owner_id, channel_id, body, scheduled_at, status,
                attempts, sent_at, last_error, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, NULL, NULL, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(draft.owner_id)
        .bind(&draft.channel_id)
        .bind(&draft.body)
        .bind(draft.scheduled_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        ScheduledMessage::try_from(row)
    }

    async fn get(&self, id: Uuid) -> DomainResult<ScheduledMessage> {
        let row = sqlx::query(r#"SELECT * FROM scheduled_messages WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ScheduledMessage::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<MessageStatus>,
    ) -> DomainResult<Vec<ScheduledMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT *
            FROM scheduled_messages
            WHERE owner_id = $1
              AND ($2::text IS NULL OR status = $2)
            ORDER BY
                (status = 'pending') DESC,
                CASE WHEN status = 'pending' THEN scheduled_at END ASC,
                updated_at DESC
            "#,
        )
        .bind(owner_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScheduledMessage::try_from).collect()
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<ScheduledMessage>> {
        // Single conditional update: the SKIP LOCKED subselect guarantees two
        // concurrent claimers never receive the same row.
        let rows = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'dispatching', updated_at = NOW()
            WHERE id IN (
                SELECT id FROM scheduled_messages
                WHERE status = 'pending' AND scheduled_at <= $1
                ORDER BY scheduled_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScheduledMessage::try_from).collect()
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        sent_at: DateTime<Utc>,
        attempts: u32,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'sent',
                sent_at = $2,
                attempts = GREATEST(attempts, $3),
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'dispatching'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_conflict(id, "sent").await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, attempts: u32) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'failed',
                last_error = $2,
                attempts = GREATEST(attempts, $3),
                updated_at = NOW()
            WHERE id = $1 AND status = 'dispatching'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_conflict(id, "failed").await);
        }
        Ok(())
    }

    async fn reschedule(
        &self,
        id: Uuid,
        next_at: DateTime<Utc>,
        attempts: u32,
        error: &str,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'pending',
                scheduled_at = $2,
                attempts = GREATEST(attempts, $3),
                last_error = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'dispatching'
            "#,
        )
        .bind(id)
        .bind(next_at)
        .bind(attempts as i32)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_conflict(id, "pending").await);
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid, owner_id: Uuid) -> DomainResult<()> {
        let row = sqlx::query(
            r#"SELECT owner_id, status FROM scheduled_messages WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))?;

        let row_owner: Uuid = row.get("owner_id");
        if row_owner != owner_id {
            return Err(DomainError::Forbidden(
                "message does not belong to owner".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let status: String = row.get("status");
            return Err(DomainError::Conflict(format!(
                "cannot cancel a {status} message"
            )));
        }
        Ok(())
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>, lease: Duration) -> DomainResult<u64> {
        let cutoff = now - lease;
        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages
            SET status = 'pending', updated_at = NOW()
            WHERE status = 'dispatching' AND updated_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn find_active(&self, owner_id: Uuid) -> DomainResult<Option<SlackCredential>> {
        let record = sqlx::query_as::<_, SlackCredentialRecord>(
            r#"
            SELECT id, owner_id, access_token, team_name, status, created_at, updated_at
            FROM slack_credentials
            WHERE owner_id = $1 AND status = 'active'
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(SlackCredential::try_from).transpose()
    }

    async fn upsert(&self, mut credential: SlackCredential) -> DomainResult<SlackCredential> {
        credential.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE slack_credentials
            SET status = 'revoked', updated_at = NOW()
            WHERE owner_id = $1 AND status = 'active' AND id <> $2
            "#,
        )
        .bind(credential.owner_id)
        .bind(credential.id)
        .execute(&mut *tx)
        .await?;

        let record = sqlx::query_as::<_, SlackCredentialRecord>(
            r#"
            INSERT INTO slack_credentials (
                id, owner_id, access_token, team_name, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                team_name = EXCLUDED.team_name,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            RETURNING id, owner_id, access_token, team_name, status, created_at, updated_at
            "#,
        )
        .bind(credential.id)
        .bind(credential.owner_id)
        .bind(&credential.access_token)
        .bind(&credential.team_name)
        .bind(credential_status_to_str(credential.status))
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        record.try_into()
    }
}

impl TryFrom<PgRow> for ScheduledMessage {
    type Error = DomainError;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        let status_str: String = row.try_get("status").map_err(sqlx_err)?;
        let status = MessageStatus::from_str(&status_str)
            .ok_or_else(|| DomainError::Other(anyhow::anyhow!("unknown status {status_str}")))?;
        let attempts: i32 = row.try_get("attempts").map_err(sqlx_err)?;

        Ok(ScheduledMessage {
            id: row.try_get("id").map_err(sqlx_err)?,
            owner_id: row.try_get("owner_id").map_err(sqlx_err)?,
            channel_id: row.try_get("channel_id").map_err(sqlx_err)?,
            body: row.try_get("body").map_err(sqlx_err)?,
            scheduled_at: row.try_get("scheduled_at").map_err(sqlx_err)?,
            status,
            attempts: attempts as u32,
            sent_at: row.try_get("sent_at").map_err(sqlx_err)?,
            last_error: row.try_get("last_error").map_err(sqlx_err)?,
            created_at: row.try_get("created_at").map_err(sqlx_err)?,
            updated_at: row.try_get("updated_at").map_err(sqlx_err)?,
        })
    }
}

#[derive(FromRow)]
struct SlackCredentialRecord {
    id: Uuid,
    owner_id: Uuid,
    access_token: String,
    team_name: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SlackCredentialRecord> for SlackCredential {
    type Error = DomainError;

    fn try_from(value: SlackCredentialRecord) -> Result<Self, Self::Error> {
        let status = match value.status.as_str() {
            "active" => CredentialStatus::Active,
            "revoked" => CredentialStatus::Revoked,
            other => {
                return Err(DomainError::Other(anyhow::anyhow!(
                    "unknown credential status {other}"
                )));
            }
        };
        Ok(SlackCredential {
            id: value.id,
            owner_id: value.owner_id,
            access_token: value.access_token,
            team_name: value.team_name,
            status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

fn credential_status_to_str(status: CredentialStatus) -> &'static str {
    match status {
        CredentialStatus::Active => "active",
        CredentialStatus::Revoked => "revoked",
    }
}

fn sqlx_err(err: sqlx::Error) -> DomainError {
    DomainError::Other(err.into())
}
