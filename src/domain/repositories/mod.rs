use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    errors::DomainResult,
    models::{MessageStatus, NewScheduledMessage, ScheduledMessage, SlackCredential},
};

/// Durable record of every scheduled send. The store is the single source of
/// truth: all coordination between scheduler instances happens through
/// conditional, atomic status transitions here, never through in-process locks.
#[async_trait]
pub trait ScheduledMessageStore: Send + Sync {
    /// Persists a new row in `Pending`. Fails with
    /// [`DomainError::Validation`](crate::domain::errors::DomainError) on bad input.
    async fn insert(&self, draft: NewScheduledMessage) -> DomainResult<ScheduledMessage>;

    async fn get(&self, id: Uuid) -> DomainResult<ScheduledMessage>;

    /// Rows for one owner. Pending rows come first ordered by `scheduled_at`
    /// ascending (the upcoming queue); the rest follow ordered by
    /// `updated_at` descending (history).
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<MessageStatus>,
    ) -> DomainResult<Vec<ScheduledMessage>>;

    /// Atomically selects up to `limit` rows with `status = Pending` and
    /// `scheduled_at <= now` and flips them to `Dispatching` in the same
    /// operation. Two concurrent callers never receive the same row.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<ScheduledMessage>>;

    /// `Dispatching -> Sent`. Sets `sent_at`, bumps `attempts`, clears
    /// `last_error`.
    async fn mark_sent(
        &self,
        id: Uuid,
        sent_at: DateTime<Utc>,
        attempts: u32,
    ) -> DomainResult<()>;

    /// `Dispatching -> Failed`, recording `last_error`.
    async fn mark_failed(&self, id: Uuid, error: &str, attempts: u32) -> DomainResult<()>;

    /// `Dispatching -> Pending` with `scheduled_at` pushed to `next_at`, so a
    /// later tick retries the row.
    async fn reschedule(
        &self,
        id: Uuid,
        next_at: DateTime<Utc>,
        attempts: u32,
        error: &str,
    ) -> DomainResult<()>;

    /// `Pending -> Cancelled`, owner-checked. Fails with `Conflict` once the
    /// row has left `Pending` (a claimed dispatch runs to completion).
    async fn cancel(&self, id: Uuid, owner_id: Uuid) -> DomainResult<()>;

    /// Recovery sweep: rows stuck in `Dispatching` with `updated_at` older
    /// than `lease` are presumed abandoned by a crashed worker and returned
    /// to `Pending`. Returns how many rows were reclaimed.
    async fn reclaim_stale(&self, now: DateTime<Utc>, lease: Duration) -> DomainResult<u64>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find_active(&self, owner_id: Uuid) -> DomainResult<Option<SlackCredential>>;
    async fn upsert(&self, credential: SlackCredential) -> DomainResult<SlackCredential>;
}
