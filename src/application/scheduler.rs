use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use futures::{StreamExt, stream};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};

use crate::{
    application::{handlers::dispatch_worker::DispatchWorker, services::clock::Clock},
    domain::{errors::DomainResult, repositories::ScheduledMessageStore},
};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: StdDuration,
    /// Max rows claimed per tick.
    pub batch_size: usize,
    /// Max dispatches in flight within one tick.
    pub max_concurrent: usize,
    /// A `Dispatching` row untouched for this long is presumed abandoned.
    pub lease_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: StdDuration::from_secs(5),
            batch_size: 50,
            max_concurrent: 8,
            lease_timeout: Duration::minutes(5),
        }
    }
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic driver: every `tick_interval` it claims due rows and hands them to
/// the worker. Restart-safe (startup sweep reclaims stale `Dispatching` rows)
/// and safe to run alongside other instances, since all coordination goes
/// through the store's atomic claim.
pub struct Scheduler {
    store: Arc<dyn ScheduledMessageStore>,
    worker: Arc<DispatchWorker>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    running: Mutex<Option<LoopHandle>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ScheduledMessageStore>,
        worker: Arc<DispatchWorker>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            worker,
            clock,
            config,
            running: Mutex::new(None),
        })
    }

    /// Starts the periodic loop. Idempotent: a second call while the loop is
    /// alive does nothing.
    pub async fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::debug!("scheduler already running");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);

        let task = tokio::spawn(async move {
            if let Err(err) = scheduler.recover().await {
                tracing::error!(error = %err, "startup recovery sweep failed");
            }

            let mut ticker = tokio::time::interval(scheduler.config.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = scheduler.run_tick().await {
                            tracing::error!(error = %err, "scheduler tick failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("scheduler loop stopping");
                        break;
                    }
                }
            }
        });

        *running = Some(LoopHandle { shutdown, task });
        tracing::info!(
            tick_interval = ?self.config.tick_interval,
            batch_size = self.config.batch_size,
            "scheduler started"
        );
    }

    /// Stops the loop and waits for it to finish. In-flight dispatches of the
    /// current tick run to completion. Idempotent.
    pub async fn stop(&self) {
        let handle = self.running.lock().await.take();
        if let Some(LoopHandle { shutdown, task }) = handle {
            let _ = shutdown.send(true);
            if let Err(err) = task.await {
                tracing::error!(error = %err, "scheduler loop join failed");
            }
            tracing::info!("scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// One tick: claim due rows and dispatch them with bounded concurrency.
    /// A row's failure is logged and never blocks the rest of the batch.
    pub async fn run_tick(&self) -> DomainResult<usize> {
        let now = self.clock.now();
        let claimed = self.store.claim_due(now, self.config.batch_size).await?;
        if claimed.is_empty() {
            return Ok(0);
        }

        let count = claimed.len();
        tracing::debug!(count, "claimed due messages");

        stream::iter(claimed)
            .for_each_concurrent(self.config.max_concurrent, |message| {
                let worker = Arc::clone(&self.worker);
                async move {
                    let message_id = message.id;
                    if let Err(err) = worker.handle(message).await {
                        tracing::error!(
                            message_id = %message_id,
                            error = %err,
                            "dispatch failed"
                        );
                    }
                }
            })
            .await;

        Ok(count)
    }

    /// Returns stale `Dispatching` rows (lease expired, worker presumed
    /// crashed) to `Pending` so they become claimable again.
    pub async fn recover(&self) -> DomainResult<u64> {
        let reclaimed = self
            .store
            .reclaim_stale(self.clock.now(), self.config.lease_timeout)
            .await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "reclaimed stale dispatching rows");
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::{
        application::services::{clock::ManualClock, retry::RetryPolicy},
        domain::{
            models::{MessageStatus, NewScheduledMessage},
            repositories::CredentialRepository,
        },
        infrastructure::repositories::in_memory::{
            InMemoryCredentialRepository, InMemoryScheduledMessageStore,
        },
        testing::{StubOutcome, StubProvider, active_credential},
    };

    struct Fixture {
        store: Arc<InMemoryScheduledMessageStore>,
        credentials: Arc<InMemoryCredentialRepository>,
        clock: Arc<ManualClock>,
        scheduler: Arc<Scheduler>,
    }

    fn fixture(outcome: StubOutcome, config: SchedulerConfig) -> Fixture {
        let store = Arc::new(InMemoryScheduledMessageStore::new());
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let provider = Arc::new(StubProvider::always(outcome));
        let worker = Arc::new(DispatchWorker::new(
            store.clone(),
            credentials.clone(),
            provider,
            clock.clone(),
            RetryPolicy::default(),
        ));
        let scheduler = Scheduler::new(store.clone(), worker, clock.clone(), config);
        Fixture {
            store,
            credentials,
            clock,
            scheduler,
        }
    }

    async fn schedule(fixture: &Fixture, owner_id: Uuid, due_in: Duration) -> Uuid {
        fixture
            .store
            .insert(NewScheduledMessage {
                owner_id,
                channel_id: "C42".to_string(),
                body: "tick".to_string(),
                scheduled_at: fixture.clock.now() + due_in,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn tick_dispatches_due_rows_only() {
        let fixture = fixture(StubOutcome::Sent, SchedulerConfig::default());
        let owner_id = Uuid::new_v4();
        fixture
            .credentials
            .upsert(active_credential(owner_id))
            .await
            .unwrap();

        let due = schedule(&fixture, owner_id, Duration::zero()).await;
        let future = schedule(&fixture, owner_id, Duration::hours(1)).await;

        let dispatched = fixture.scheduler.run_tick().await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(
            fixture.store.get(due).await.unwrap().status,
            MessageStatus::Sent
        );
        assert_eq!(
            fixture.store.get(future).await.unwrap().status,
            MessageStatus::Pending
        );
    }

    #[tokio::test]
    async fn one_bad_row_does_not_block_the_batch() {
        let fixture = fixture(StubOutcome::Sent, SchedulerConfig::default());
        let good_owner = Uuid::new_v4();
        let bad_owner = Uuid::new_v4();
        // only the good owner has a credential
        fixture
            .credentials
            .upsert(active_credential(good_owner))
            .await
            .unwrap();

        let good = schedule(&fixture, good_owner, Duration::zero()).await;
        let bad = schedule(&fixture, bad_owner, Duration::zero()).await;

        let dispatched = fixture.scheduler.run_tick().await.unwrap();
        assert_eq!(dispatched, 2);
        assert_eq!(
            fixture.store.get(good).await.unwrap().status,
            MessageStatus::Sent
        );
        assert_eq!(
            fixture.store.get(bad).await.unwrap().status,
            MessageStatus::Failed
        );
    }

    #[tokio::test]
    async fn recovery_sweep_makes_stale_rows_claimable_again() {
        let fixture = fixture(StubOutcome::Sent, SchedulerConfig::default());
        let owner_id = Uuid::new_v4();
        fixture
            .credentials
            .upsert(active_credential(owner_id))
            .await
            .unwrap();
        let id = schedule(&fixture, owner_id, Duration::zero()).await;

        // claim, then simulate the worker dying: never resolve the row
        let claimed = fixture.store.claim_due(fixture.clock.now(), 10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        fixture.clock.advance(Duration::minutes(10));
        let reclaimed = fixture.scheduler.recover().await.unwrap();
        assert_eq!(reclaimed, 1);
        assert_eq!(
            fixture.store.get(id).await.unwrap().status,
            MessageStatus::Pending
        );

        let dispatched = fixture.scheduler.run_tick().await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(
            fixture.store.get(id).await.unwrap().status,
            MessageStatus::Sent
        );
    }

    #[tokio::test]
    async fn recovery_leaves_fresh_dispatching_rows_alone() {
        let fixture = fixture(StubOutcome::Sent, SchedulerConfig::default());
        let owner_id = Uuid::new_v4();
        let id = schedule(&fixture, owner_id, Duration::zero()).await;

        let claimed = fixture.store.claim_due(fixture.clock.now(), 10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        // lease has not expired yet
        fixture.clock.advance(Duration::minutes(1));
        let reclaimed = fixture.scheduler.recover().await.unwrap();
        assert_eq!(reclaimed, 0);
        assert_eq!(
            fixture.store.get(id).await.unwrap().status,
            MessageStatus::Dispatching
        );
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_halts_the_loop() {
        let config = SchedulerConfig {
            tick_interval: StdDuration::from_millis(10),
            ..SchedulerConfig::default()
        };
        let fixture = fixture(StubOutcome::Sent, config);

        fixture.scheduler.start().await;
        fixture.scheduler.start().await;
        assert!(fixture.scheduler.is_running().await);

        fixture.scheduler.stop().await;
        assert!(!fixture.scheduler.is_running().await);
        fixture.scheduler.stop().await;
    }

    #[tokio::test]
    async fn end_to_end_scheduled_message_is_sent_after_due_time() {
        let config = SchedulerConfig {
            tick_interval: StdDuration::from_millis(10),
            ..SchedulerConfig::default()
        };
        let fixture = fixture(StubOutcome::Sent, config);
        let owner_id = Uuid::new_v4();
        fixture
            .credentials
            .upsert(active_credential(owner_id))
            .await
            .unwrap();

        let id = schedule(&fixture, owner_id, Duration::milliseconds(30)).await;

        fixture.scheduler.start().await;

        let mut sent = false;
        for _ in 0..100 {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            fixture.clock.advance(Duration::milliseconds(10));
            if fixture.store.get(id).await.unwrap().status == MessageStatus::Sent {
                sent = true;
                break;
            }
        }
        fixture.scheduler.stop().await;

        assert!(sent, "message should have been sent after its due time");
        let stored = fixture.store.get(id).await.unwrap();
        let sent_at = stored.sent_at.expect("sent_at set on sent row");
        assert!((sent_at - stored.scheduled_at).abs() < Duration::seconds(2));
    }
}
