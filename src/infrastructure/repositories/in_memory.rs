use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, DomainResult},
    models::{
        CredentialStatus, MessageStatus, NewScheduledMessage, ScheduledMessage, SlackCredential,
    },
    repositories::{CredentialRepository, ScheduledMessageStore},
};

/// Map-backed store used by tests and credential-less dev runs. Every
/// transition runs under one write lock, which makes `claim_due` atomic with
/// respect to concurrent callers.
#[derive(Default)]
pub struct InMemoryScheduledMessageStore {
    messages: Arc<RwLock<HashMap<Uuid, ScheduledMessage>>>,
}

impl InMemoryScheduledMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduledMessageStore for InMemoryScheduledMessageStore {
    async fn insert(&self, draft: NewScheduledMessage) -> DomainResult<ScheduledMessage> {
        draft.validate().map_err(DomainError::Validation)?;

        let now = Utc::now();
        let message = ScheduledMessage {
            id: Uuid::new_v4(),
            owner_id: draft.owner_id,
            channel_id: draft.channel_id,
            body: draft.body,
            scheduled_at: draft.scheduled_at,
            status: MessageStatus::Pending,
            attempts: 0,
            sent_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        let mut messages = self.messages.write().await;
        messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn get(&self, id: Uuid) -> DomainResult<ScheduledMessage> {
        let messages = self.messages.read().await;
        messages
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        status: Option<MessageStatus>,
    ) -> DomainResult<Vec<ScheduledMessage>> {
        let messages = self.messages.read().await;
        let mut rows: Vec<ScheduledMessage> = messages
            .values()
            .filter(|m| m.owner_id == owner_id)
            .filter(|m| status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();

        // upcoming queue first (pending by due time), then history by recency
        rows.sort_by(|a, b| {
            let a_pending = a.status == MessageStatus::Pending;
            let b_pending = b.status == MessageStatus::Pending;
            match (a_pending, b_pending) {
                (true, true) => a.scheduled_at.cmp(&b.scheduled_at),
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                (false, false) => b.updated_at.cmp(&a.updated_at),
            }
        });
        Ok(rows)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<ScheduledMessage>> {
        let mut messages = self.messages.write().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = messages
            .values()
            .filter(|m| m.status == MessageStatus::Pending && m.scheduled_at <= now)
            .map(|m| (m.scheduled_at, m.id))
            .collect();
        due.sort_by_key(|(scheduled_at, _)| *scheduled_at);
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(message) = messages.get_mut(&id) {
                message.status = MessageStatus::Dispatching;
                message.updated_at = Utc::now();
                claimed.push(message.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        sent_at: DateTime<Utc>,
        attempts: u32,
    ) -> DomainResult<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))?;

        if message.status != MessageStatus::Dispatching {
            return Err(DomainError::InvalidTransition(format!(
                "{} -> sent",
                message.status.as_str()
            )));
        }

        message.status = MessageStatus::Sent;
        message.sent_at = Some(sent_at);
        message.attempts = message.attempts.max(attempts);
        message.last_error = None;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, attempts: u32) -> DomainResult<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))?;

        if message.status != MessageStatus::Dispatching {
            return Err(DomainError::InvalidTransition(format!(
                "{} -> failed",
                message.status.as_str()
            )));
        }

        message.status = MessageStatus::Failed;
        message.last_error = Some(error.to_string());
        message.attempts = message.attempts.max(attempts);
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn reschedule(
        &self,
        id: Uuid,
        next_at: DateTime<Utc>,
        attempts: u32,
        error: &str,
    ) -> DomainResult<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))?;

        if message.status != MessageStatus::Dispatching {
            return Err(DomainError::InvalidTransition(format!(
                "{} -> pending",
                message.status.as_str()
            )));
        }

        message.status = MessageStatus::Pending;
        message.scheduled_at = next_at;
        message.attempts = message.attempts.max(attempts);
        message.last_error = Some(error.to_string());
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel(&self, id: Uuid, owner_id: Uuid) -> DomainResult<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("scheduled message {id}")))?;

        if message.owner_id != owner_id {
            return Err(DomainError::Forbidden(
                "message does not belong to owner".to_string(),
            ));
        }
        if message.status != MessageStatus::Pending {
            return Err(DomainError::Conflict(format!(
                "cannot cancel a {} message",
                message.status.as_str()
            )));
        }

        message.status = MessageStatus::Cancelled;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>, lease: Duration) -> DomainResult<u64> {
        let cutoff = now - lease;
        let mut messages = self.messages.write().await;
        let mut reclaimed = 0;
        for message in messages.values_mut() {
            if message.status == MessageStatus::Dispatching && message.updated_at <= cutoff {
                message.status = MessageStatus::Pending;
                message.updated_at = Utc::now();
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: Arc<RwLock<HashMap<Uuid, SlackCredential>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find_active(&self, owner_id: Uuid) -> DomainResult<Option<SlackCredential>> {
        let credentials = self.credentials.read().await;
        Ok(credentials
            .values()
            .find(|c| c.owner_id == owner_id && c.status == CredentialStatus::Active)
            .cloned())
    }

    async fn upsert(&self, mut credential: SlackCredential) -> DomainResult<SlackCredential> {
        credential.updated_at = Utc::now();
        let mut credentials = self.credentials.write().await;

        // one active credential per owner
        for existing in credentials.values_mut() {
            if existing.owner_id == credential.owner_id
                && existing.status == CredentialStatus::Active
                && existing.id != credential.id
            {
                existing.status = CredentialStatus::Revoked;
                existing.updated_at = Utc::now();
            }
        }

        credentials.insert(credential.id, credential.clone());
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;

    use super::*;

    fn draft(owner_id: Uuid, scheduled_at: DateTime<Utc>) -> NewScheduledMessage {
        NewScheduledMessage {
            owner_id,
            channel_id: "C123".to_string(),
            body: "hello".to_string(),
            scheduled_at,
        }
    }

    #[tokio::test]
    async fn insert_then_get_returns_pending_row() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let scheduled_at = Utc::now() + Duration::minutes(5);

        let inserted = store.insert(draft(owner_id, scheduled_at)).await.unwrap();
        let fetched = store.get(inserted.id).await.unwrap();

        assert_eq!(fetched.status, MessageStatus::Pending);
        assert_eq!(fetched.owner_id, owner_id);
        assert_eq!(fetched.channel_id, "C123");
        assert_eq!(fetched.body, "hello");
        assert_eq!(fetched.scheduled_at, scheduled_at);
        assert_eq!(fetched.attempts, 0);
        assert!(fetched.sent_at.is_none());
        assert!(fetched.last_error.is_none());
    }

    #[tokio::test]
    async fn insert_rejects_invalid_input() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();

        let empty_body = NewScheduledMessage {
            body: "  ".to_string(),
            ..draft(owner_id, now)
        };
        assert!(matches!(
            store.insert(empty_body).await,
            Err(DomainError::Validation(_))
        ));

        let empty_channel = NewScheduledMessage {
            channel_id: String::new(),
            ..draft(owner_id, now)
        };
        assert!(matches!(
            store.insert(empty_channel).await,
            Err(DomainError::Validation(_))
        ));

        let oversized = NewScheduledMessage {
            body: "x".repeat(crate::domain::models::MAX_BODY_LEN + 1),
            ..draft(owner_id, now)
        };
        assert!(matches!(
            store.insert(oversized).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn claim_due_skips_future_and_non_pending_rows() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();

        let due = store.insert(draft(owner_id, now)).await.unwrap();
        let future = store
            .insert(draft(owner_id, now + Duration::hours(1)))
            .await
            .unwrap();
        let cancelled = store.insert(draft(owner_id, now)).await.unwrap();
        store.cancel(cancelled.id, owner_id).await.unwrap();

        let claimed = store.claim_due(now, 10).await.unwrap();
        let ids: Vec<Uuid> = claimed.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![due.id]);
        assert_eq!(claimed[0].status, MessageStatus::Dispatching);
        assert_eq!(
            store.get(future.id).await.unwrap().status,
            MessageStatus::Pending
        );
    }

    #[tokio::test]
    async fn claim_due_respects_limit() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();
        for _ in 0..5 {
            store.insert(draft(owner_id, now)).await.unwrap();
        }

        let first = store.claim_due(now, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let rest = store.claim_due(now, 10).await.unwrap();
        assert_eq!(rest.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_claims_never_overlap() {
        let store = Arc::new(InMemoryScheduledMessageStore::new());
        let owner_id = Uuid::new_v4();
        let now = Utc::now();
        for _ in 0..50 {
            store.insert(draft(owner_id, now)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.claim_due(now, 10).await },
            ));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            let claimed = handle.await.unwrap().unwrap();
            for message in claimed {
                assert!(
                    seen.insert(message.id),
                    "row {} claimed twice",
                    message.id
                );
                total += 1;
            }
        }
        assert_eq!(total, 50);
    }

    #[tokio::test]
    async fn cancel_only_from_pending() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();

        let pending = store.insert(draft(owner_id, now)).await.unwrap();
        store.cancel(pending.id, owner_id).await.unwrap();
        assert_eq!(
            store.get(pending.id).await.unwrap().status,
            MessageStatus::Cancelled
        );

        // already cancelled
        assert!(matches!(
            store.cancel(pending.id, owner_id).await,
            Err(DomainError::Conflict(_))
        ));

        // dispatching
        let claimed = store.insert(draft(owner_id, now)).await.unwrap();
        store.claim_due(now, 10).await.unwrap();
        assert!(matches!(
            store.cancel(claimed.id, owner_id).await,
            Err(DomainError::Conflict(_))
        ));
        let unchanged = store.get(claimed.id).await.unwrap();
        assert_eq!(unchanged.status, MessageStatus::Dispatching);

        // sent
        store.mark_sent(claimed.id, Utc::now(), 1).await.unwrap();
        assert!(matches!(
            store.cancel(claimed.id, owner_id).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn cancel_checks_owner_and_existence() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let message = store.insert(draft(owner_id, Utc::now())).await.unwrap();

        assert!(matches!(
            store.cancel(message.id, Uuid::new_v4()).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            store.cancel(Uuid::new_v4(), owner_id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn terminal_transitions_require_dispatching() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let message = store.insert(draft(owner_id, Utc::now())).await.unwrap();

        // still pending
        assert!(matches!(
            store.mark_sent(message.id, Utc::now(), 1).await,
            Err(DomainError::InvalidTransition(_))
        ));
        assert!(matches!(
            store.mark_failed(message.id, "boom", 1).await,
            Err(DomainError::InvalidTransition(_))
        ));
        assert!(matches!(
            store
                .reschedule(message.id, Utc::now(), 1, "boom")
                .await,
            Err(DomainError::InvalidTransition(_))
        ));

        // sent rows stay sent
        store.claim_due(Utc::now(), 10).await.unwrap();
        store.mark_sent(message.id, Utc::now(), 1).await.unwrap();
        assert!(matches!(
            store.mark_failed(message.id, "boom", 2).await,
            Err(DomainError::InvalidTransition(_))
        ));

        assert!(matches!(
            store.mark_sent(Uuid::new_v4(), Utc::now(), 1).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reschedule_moves_row_back_into_the_queue() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();
        let message = store.insert(draft(owner_id, now)).await.unwrap();

        store.claim_due(now, 10).await.unwrap();
        let next_at = now + Duration::minutes(1);
        store
            .reschedule(message.id, next_at, 1, "ratelimited")
            .await
            .unwrap();

        let stored = store.get(message.id).await.unwrap();
        assert_eq!(stored.status, MessageStatus::Pending);
        assert_eq!(stored.scheduled_at, next_at);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_error.as_deref(), Some("ratelimited"));

        // not claimable until next_at
        assert!(store.claim_due(now, 10).await.unwrap().is_empty());
        assert_eq!(store.claim_due(next_at, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reclaim_stale_only_touches_expired_leases() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();
        let message = store.insert(draft(owner_id, now)).await.unwrap();
        store.claim_due(now, 10).await.unwrap();

        // lease not expired relative to real updated_at
        let reclaimed = store
            .reclaim_stale(Utc::now(), Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(reclaimed, 0);

        // pretend the lease expired by sweeping from the future
        let reclaimed = store
            .reclaim_stale(Utc::now() + Duration::minutes(10), Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(reclaimed, 1);
        assert_eq!(
            store.get(message.id).await.unwrap().status,
            MessageStatus::Pending
        );
    }

    #[tokio::test]
    async fn list_by_owner_orders_queue_then_history() {
        let store = InMemoryScheduledMessageStore::new();
        let owner_id = Uuid::new_v4();
        let other_owner = Uuid::new_v4();
        let now = Utc::now();

        let later = store
            .insert(draft(owner_id, now + Duration::hours(2)))
            .await
            .unwrap();
        let sooner = store
            .insert(draft(owner_id, now + Duration::hours(1)))
            .await
            .unwrap();
        let done = store.insert(draft(owner_id, now)).await.unwrap();
        store.claim_due(now, 10).await.unwrap();
        store.mark_sent(done.id, now, 1).await.unwrap();
        store.insert(draft(other_owner, now)).await.unwrap();

        let rows = store.list_by_owner(owner_id, None).await.unwrap();
        let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![sooner.id, later.id, done.id]);

        let pending_only = store
            .list_by_owner(owner_id, Some(MessageStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending_only.len(), 2);
    }

    #[tokio::test]
    async fn credential_upsert_keeps_one_active_per_owner() {
        let repo = InMemoryCredentialRepository::new();
        let owner_id = Uuid::new_v4();
        let now = Utc::now();

        let first = SlackCredential {
            id: Uuid::new_v4(),
            owner_id,
            access_token: "xoxb-first".to_string(),
            team_name: None,
            status: CredentialStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let second = SlackCredential {
            id: Uuid::new_v4(),
            access_token: "xoxb-second".to_string(),
            ..first.clone()
        };

        repo.upsert(first).await.unwrap();
        repo.upsert(second).await.unwrap();

        let active = repo.find_active(owner_id).await.unwrap().unwrap();
        assert_eq!(active.access_token, "xoxb-second");
    }
}
