//! Retry queue and the worker that drains it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{DeliveryState, FailureReason, RetryConfig, TRACING_TARGET};
use crate::service::delivery::{DeliveryOutcome, Dispatcher, LogicalDelivery};
use crate::{Error, ErrorKind, Result};

/// A chain waiting for the worker.
struct QueuedChain {
    delivery: LogicalDelivery,
    after_attempt: u32,
    state: watch::Sender<DeliveryState>,
}

/// Drives logical deliveries to a terminal [`DeliveryState`].
///
/// Cloning is cheap; all clones feed the same [`RetryWorker`].
#[derive(Clone)]
pub struct RetryScheduler {
    dispatcher: Dispatcher,
    config: Arc<RetryConfig>,
    queue: mpsc::UnboundedSender<QueuedChain>,
}

impl fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("config", &self.config)
            .field("closed", &self.queue.is_closed())
            .finish_non_exhaustive()
    }
}

impl RetryScheduler {
    /// Creates a scheduler and the worker that consumes its queue.
    pub fn new(dispatcher: Dispatcher, config: RetryConfig) -> (Self, RetryWorker) {
        let (queue, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            dispatcher,
            config: Arc::new(config),
            queue,
        };

        let worker = RetryWorker {
            scheduler: scheduler.clone(),
            receiver,
            tracker: TaskTracker::new(),
        };

        (scheduler, worker)
    }

    /// Returns the retry policy.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Drives a new chain to completion on the current task.
    pub async fn run(&self, delivery: LogicalDelivery) -> DeliveryState {
        let (state, _) = watch::channel(DeliveryState::Pending);
        self.drive(&delivery, 0, &state, &CancellationToken::new())
            .await
    }

    /// Queues a new chain, starting with attempt 1.
    ///
    /// The returned receiver follows the chain's state; dropping it does not
    /// affect delivery.
    pub fn schedule(&self, delivery: LogicalDelivery) -> Result<watch::Receiver<DeliveryState>> {
        self.resume(delivery, 0)
    }

    /// Queues a chain whose first `after_attempt` attempts were already made.
    ///
    /// The worker waits for the backoff of attempt `after_attempt` before
    /// making the next one.
    pub fn resume(
        &self,
        delivery: LogicalDelivery,
        after_attempt: u32,
    ) -> Result<watch::Receiver<DeliveryState>> {
        let (state, receiver) = watch::channel(DeliveryState::Pending);

        tracing::debug!(
            target: TRACING_TARGET,
            webhook_id = %delivery.webhook_id,
            event = %delivery.event,
            after_attempt,
            "Queueing delivery chain"
        );

        self.queue
            .send(QueuedChain {
                delivery,
                after_attempt,
                state,
            })
            .map_err(|_| Error::internal("retry", "retry queue is closed"))?;

        Ok(receiver)
    }

    async fn drive(
        &self,
        delivery: &LogicalDelivery,
        mut attempts: u32,
        state: &watch::Sender<DeliveryState>,
        cancel: &CancellationToken,
    ) -> DeliveryState {
        let finish = |terminal: DeliveryState| {
            tracing::info!(
                target: TRACING_TARGET,
                webhook_id = %delivery.webhook_id,
                event = %delivery.event,
                state = ?terminal,
                "Delivery chain finished"
            );
            state.send_replace(terminal.clone());
            terminal
        };

        loop {
            if attempts > 0 {
                if attempts >= self.config.max_attempts {
                    return finish(DeliveryState::PermanentlyFailed {
                        reason: FailureReason::Exhausted,
                        attempts,
                    });
                }

                let next_delay = self.config.backoff(attempts);
                let retrying = DeliveryState::Retrying {
                    attempt: attempts,
                    next_delay,
                };
                state.send_replace(retrying.clone());

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            webhook_id = %delivery.webhook_id,
                            event = %delivery.event,
                            timestamp = %delivery.timestamp,
                            attempt = attempts,
                            "Delivery chain interrupted by shutdown, retry not sent"
                        );
                        return retrying;
                    }
                    _ = tokio::time::sleep(next_delay) => {}
                }
            }

            let attempt = attempts + 1;
            state.send_replace(DeliveryState::Delivering { attempt });

            match self.dispatcher.dispatch(&delivery.attempt(attempt)).await {
                Ok(DeliveryOutcome::Delivered { status }) => {
                    return finish(DeliveryState::Delivered {
                        status,
                        attempts: attempt,
                    });
                }
                Ok(DeliveryOutcome::Inactive) => {
                    return finish(DeliveryState::PermanentlyFailed {
                        reason: FailureReason::Deactivated,
                        attempts,
                    });
                }
                Ok(outcome) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        webhook_id = %delivery.webhook_id,
                        attempt,
                        status_code = ?outcome.status(),
                        "Delivery attempt failed"
                    );
                    attempts = attempt;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return finish(DeliveryState::PermanentlyFailed {
                        reason: FailureReason::WebhookRemoved,
                        attempts,
                    });
                }
                Err(err) if matches!(err.kind(), ErrorKind::Config | ErrorKind::InvalidInput) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        webhook_id = %delivery.webhook_id,
                        error = %err,
                        "Webhook cannot be delivered to"
                    );
                    return finish(DeliveryState::PermanentlyFailed {
                        reason: FailureReason::Misconfigured,
                        attempts,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        webhook_id = %delivery.webhook_id,
                        attempt,
                        error = %err,
                        "Delivery attempt errored"
                    );
                    attempts = attempt;
                }
            }
        }
    }
}

/// Consumes the retry queue, one task per chain.
pub struct RetryWorker {
    scheduler: RetryScheduler,
    receiver: mpsc::UnboundedReceiver<QueuedChain>,
    tracker: TaskTracker,
}

impl fmt::Debug for RetryWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryWorker")
            .field("chains", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl RetryWorker {
    /// Runs until `cancel` fires, then waits for in-flight chains.
    ///
    /// Chains sleeping between attempts stop at once on cancellation; an
    /// attempt already in flight is allowed to finish and be recorded.
    /// Chains still queued at shutdown are started too: those without an
    /// attempt yet make their first one, resumed ones end as
    /// [`DeliveryState::Retrying`] without further HTTP.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(target: TRACING_TARGET, "Starting retry worker");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(
                        target: TRACING_TARGET,
                        "Retry worker shutdown requested"
                    );
                    break;
                }
                chain = self.receiver.recv() => {
                    let Some(chain) = chain else { break };
                    self.spawn(chain, cancel.child_token());
                }
            }
        }

        self.receiver.close();
        let mut drained = 0usize;
        while let Some(chain) = self.receiver.recv().await {
            drained += 1;
            self.spawn(chain, cancel.child_token());
        }

        if drained > 0 {
            tracing::info!(
                target: TRACING_TARGET,
                drained,
                "Started chains queued at shutdown"
            );
        }

        self.tracker.close();
        self.tracker.wait().await;

        tracing::info!(target: TRACING_TARGET, "Retry worker stopped");
    }

    fn spawn(&self, chain: QueuedChain, cancel: CancellationToken) {
        let scheduler = self.scheduler.clone();

        self.tracker.spawn(async move {
            let QueuedChain {
                delivery,
                after_attempt,
                state,
            } = chain;

            scheduler
                .drive(&delivery, after_attempt, &state, &cancel)
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_postgres::model::{NewWebhook, Webhook};
    use courier_postgres::types::WebhookEvent;
    use courier_webhook::mock::{Scripted, ScriptedProvider};
    use serde_json::json;

    use super::*;
    use crate::service::store::{DeliveryLedger, MemoryStore};

    fn register(store: &MemoryStore) -> Webhook {
        store
            .insert_webhook(NewWebhook::new(
                "crm",
                "https://example.com/hooks",
                "testsecret",
                [WebhookEvent::TicketCreated],
            ))
            .unwrap()
    }

    fn scheduler(
        store: &MemoryStore,
        provider: &ScriptedProvider,
    ) -> (RetryScheduler, RetryWorker) {
        let dispatcher = Dispatcher::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            provider.clone().into_service(),
        );
        RetryScheduler::new(dispatcher, RetryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_receiver_exhausts_attempts() {
        let store = MemoryStore::new();
        let webhook = register(&store);
        let provider = ScriptedProvider::new(std::iter::repeat_n(Scripted::status(500), 10));
        let (scheduler, _worker) = scheduler(&store, &provider);

        let delivery = LogicalDelivery::new(webhook.id, WebhookEvent::TicketCreated, json!({}));
        let state = scheduler.run(delivery.clone()).await;

        assert_eq!(
            state,
            DeliveryState::PermanentlyFailed {
                reason: FailureReason::Exhausted,
                attempts: 5
            }
        );
        assert_eq!(provider.delivered(), 5);

        let rows = store
            .list_logical_attempts(webhook.id, WebhookEvent::TicketCreated, delivery.timestamp)
            .await
            .unwrap();
        let attempts: Vec<_> = rows.iter().map(|row| row.attempt_count).collect();
        assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
        assert!(rows.iter().all(|row| row.response_status == Some(500)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_two_failures() {
        let store = MemoryStore::new();
        let webhook = register(&store);
        let provider = ScriptedProvider::new([
            Scripted::status(500),
            Scripted::transport_error("Request timed out"),
            Scripted::status(200),
        ]);
        let (scheduler, _worker) = scheduler(&store, &provider);

        let started = tokio::time::Instant::now();
        let state = scheduler
            .run(LogicalDelivery::new(
                webhook.id,
                WebhookEvent::TicketCreated,
                json!({"id": 1}),
            ))
            .await;

        assert_eq!(
            state,
            DeliveryState::Delivered {
                status: 200,
                attempts: 3
            }
        );
        assert!(started.elapsed() >= Duration::from_secs(3));

        let rows = store.deliveries();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].error_message.as_deref(), Some("Request timed out"));
        assert_eq!(rows[2].response_status, Some(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_stops_the_chain() {
        let store = MemoryStore::new();
        let webhook = register(&store);

        let hook_store = store.clone();
        let webhook_id = webhook.id;
        let provider = ScriptedProvider::with_hook(
            std::iter::repeat_n(Scripted::status(503), 5),
            move |_| {
                hook_store.set_active(webhook_id, false);
            },
        );
        let (scheduler, _worker) = scheduler(&store, &provider);

        let state = scheduler
            .run(LogicalDelivery::new(
                webhook.id,
                WebhookEvent::TicketCreated,
                json!({}),
            ))
            .await;

        assert_eq!(
            state,
            DeliveryState::PermanentlyFailed {
                reason: FailureReason::Deactivated,
                attempts: 1
            }
        );
        assert_eq!(provider.delivered(), 1);
        assert_eq!(store.deliveries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_webhook_stops_the_chain() {
        let store = MemoryStore::new();
        let webhook = register(&store);

        let hook_store = store.clone();
        let webhook_id = webhook.id;
        let provider = ScriptedProvider::with_hook([Scripted::status(500)], move |_| {
            hook_store.remove_webhook(webhook_id);
        });
        let (scheduler, _worker) = scheduler(&store, &provider);

        let state = scheduler
            .run(LogicalDelivery::new(
                webhook.id,
                WebhookEvent::TicketCreated,
                json!({}),
            ))
            .await;

        assert_eq!(
            state,
            DeliveryState::PermanentlyFailed {
                reason: FailureReason::WebhookRemoved,
                attempts: 1
            }
        );
        assert_eq!(provider.delivered(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_drives_queued_chains() {
        let store = MemoryStore::new();
        let webhook = register(&store);
        let provider = ScriptedProvider::new([Scripted::status(500)]);
        let (scheduler, worker) = scheduler(&store, &provider);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let mut state = scheduler
            .schedule(LogicalDelivery::new(
                webhook.id,
                WebhookEvent::TicketCreated,
                json!({}),
            ))
            .unwrap();
        let terminal = state
            .wait_for(DeliveryState::is_terminal)
            .await
            .unwrap()
            .clone();

        assert_eq!(
            terminal,
            DeliveryState::Delivered {
                status: 200,
                attempts: 2
            }
        );

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(store.deliveries().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_skips_made_attempts() {
        let store = MemoryStore::new();
        let webhook = register(&store);
        let provider = ScriptedProvider::default();
        let dispatcher = Dispatcher::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            provider.clone().into_service(),
        );
        let config = RetryConfig::default().with_delays(1, 1);
        let (scheduler, worker) = RetryScheduler::new(dispatcher, config);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let mut state = scheduler
            .resume(
                LogicalDelivery::new(webhook.id, WebhookEvent::TicketCreated, json!({})),
                1,
            )
            .unwrap();
        let terminal = state
            .wait_for(DeliveryState::is_terminal)
            .await
            .unwrap()
            .clone();

        assert_eq!(
            terminal,
            DeliveryState::Delivered {
                status: 200,
                attempts: 2
            }
        );
        assert_eq!(store.deliveries()[0].attempt_count, 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_backoff() {
        let store = MemoryStore::new();
        let webhook = register(&store);
        let provider = ScriptedProvider::new([Scripted::status(500)]);
        let dispatcher = Dispatcher::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            provider.clone().into_service(),
        );
        let config = RetryConfig::default().with_delays(60_000, 60_000);
        let (scheduler, worker) = RetryScheduler::new(dispatcher, config);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let mut state = scheduler
            .schedule(LogicalDelivery::new(
                webhook.id,
                WebhookEvent::TicketCreated,
                json!({}),
            ))
            .unwrap();
        state
            .wait_for(|s| matches!(s, DeliveryState::Retrying { .. }))
            .await
            .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(provider.delivered(), 1);

        let late = LogicalDelivery::new(webhook.id, WebhookEvent::TicketCreated, json!({}));
        assert!(scheduler.schedule(late).is_err());
    }

    #[tokio::test]
    async fn test_chains_queued_at_shutdown_are_not_dropped() {
        let store = MemoryStore::new();
        let webhook = register(&store);
        let provider = ScriptedProvider::default();
        let (scheduler, worker) = scheduler(&store, &provider);

        let mut states: Vec<_> = (0..20)
            .map(|n| {
                let delivery =
                    LogicalDelivery::new(webhook.id, WebhookEvent::TicketCreated, json!({"n": n}));
                scheduler.schedule(delivery).unwrap()
            })
            .collect();
        let resumed = LogicalDelivery::new(webhook.id, WebhookEvent::TicketCreated, json!({}));
        states.push(scheduler.resume(resumed, 2).unwrap());

        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), worker.run(cancel))
            .await
            .unwrap();

        assert_eq!(provider.delivered(), 20);
        assert_eq!(store.deliveries().len(), 20);

        let resumed_state = states.pop().unwrap();
        assert!(matches!(
            *resumed_state.borrow(),
            DeliveryState::Retrying { attempt: 2, .. }
        ));
        assert!(states.iter().all(|state| matches!(
            *state.borrow(),
            DeliveryState::Delivered { status: 200, attempts: 1 }
        )));
    }
}
