//! Worker: pulls events off the shared queue and drives each one through
//! attempt → (retry with backoff)* → Sent | Failed.

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::ShutdownPolicy;
use crate::error::{HandlerError, QueueError};
use crate::event::Event;
use crate::handler::{AttemptContext, EventHandler};
use crate::queue::EventQueue;
use crate::shutdown::ShutdownListener;
use crate::sink::{EventStatus, StatusSink};
use crate::stats::PoolStats;

/// Terminal result of processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    /// Dropped at shutdown under `ShutdownPolicy::Abandon`.
    Abandoned,
}

/// One competing consumer. Owns each dequeued event until it is terminal;
/// retries never go back through the queue.
pub struct Worker<P> {
    id: usize,
    queue: Arc<EventQueue<P>>,
    handler: Arc<dyn EventHandler<P>>,
    sink: Arc<dyn StatusSink>,
    stats: Arc<PoolStats>,
    policy: ShutdownPolicy,
    shutdown: ShutdownListener,
}

impl<P> Worker<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(
        id: usize,
        queue: Arc<EventQueue<P>>,
        handler: Arc<dyn EventHandler<P>>,
        sink: Arc<dyn StatusSink>,
        stats: Arc<PoolStats>,
        policy: ShutdownPolicy,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            id,
            queue,
            handler,
            sink,
            stats,
            policy,
            shutdown,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Consume until shutdown. The signal is checked before every dequeue,
    /// so events still queued at that point stay in the queue.
    pub async fn run(mut self) {
        let _active = ActiveGuard::enter(Arc::clone(&self.stats));
        info!(worker_id = self.id, "worker started");

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            match self.queue.dequeue() {
                Ok(event) => {
                    self.process(event).await;
                }
                Err(QueueError::Empty) => {
                    tokio::select! {
                        _ = self.queue.notified() => {}
                        _ = self.shutdown.triggered() => {}
                    }
                }
            }
        }

        info!(worker_id = self.id, "shutdown signal received, worker exiting");
    }

    /// Run one event to a terminal state, mutating its retry count in place.
    pub async fn process(&mut self, mut event: Event<P>) -> Outcome {
        let mut backoff = Backoff::from_policy(event.policy());

        loop {
            let ctx = AttemptContext {
                worker_id: self.id,
                attempt: event.attempt(),
                deadline: event.policy().timeout.map(|limit| Instant::now() + limit),
            };

            let attempt = run_attempt(self.handler.as_ref(), &event, &ctx);
            let result = match self.policy {
                ShutdownPolicy::Drain => attempt.await,
                ShutdownPolicy::Abandon => {
                    match unless_shutdown(&mut self.shutdown, attempt).await {
                        Some(result) => result,
                        None => return self.abandon(&event),
                    }
                }
            };

            let err = match result {
                Ok(()) => {
                    self.sink.report(event.id(), &EventStatus::Sent);
                    self.stats.record_success();
                    info!(
                        worker_id = self.id,
                        event_id = %event.id(),
                        attempt = ctx.attempt,
                        "event processed"
                    );
                    return Outcome::Succeeded;
                }
                Err(err) => err,
            };

            if !event.record_failure() {
                self.sink.report(event.id(), &EventStatus::Failed);
                self.stats.record_failure();
                warn!(
                    worker_id = self.id,
                    event_id = %event.id(),
                    retries = event.retry_count(),
                    error = %err,
                    "event failed, retries exhausted"
                );
                return Outcome::Failed;
            }

            let status = EventStatus::Retrying {
                attempt: event.retry_count(),
                max: event.max_retries(),
            };
            self.sink.report(event.id(), &status);
            self.stats.record_retry();

            let delay = backoff.next_delay();
            debug!(
                worker_id = self.id,
                event_id = %event.id(),
                %status,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, backing off"
            );

            let sleep = tokio::time::sleep(delay);
            match self.policy {
                ShutdownPolicy::Drain => sleep.await,
                ShutdownPolicy::Abandon => {
                    if unless_shutdown(&mut self.shutdown, sleep).await.is_none() {
                        return self.abandon(&event);
                    }
                }
            }
        }
    }

    fn abandon(&self, event: &Event<P>) -> Outcome {
        self.stats.record_abandoned();
        warn!(
            worker_id = self.id,
            event_id = %event.id(),
            retries = event.retry_count(),
            "abandoning in-flight event on shutdown"
        );
        Outcome::Abandoned
    }
}

/// One handler invocation, bounded by the event timeout if it has one.
async fn run_attempt<P>(
    handler: &dyn EventHandler<P>,
    event: &Event<P>,
    ctx: &AttemptContext,
) -> Result<(), HandlerError> {
    match event.policy().timeout {
        Some(limit) => tokio::time::timeout(limit, handler.handle(event, ctx))
            .await
            .unwrap_or(Err(HandlerError::TimedOut(limit))),
        None => handler.handle(event, ctx).await,
    }
}

/// `None` if shutdown was raised before `fut` completed.
async fn unless_shutdown<F: Future>(shutdown: &mut ShutdownListener, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => None,
        out = fut => Some(out),
    }
}

/// Keeps `active_workers` right even if the worker task panics.
struct ActiveGuard(Arc<PoolStats>);

impl ActiveGuard {
    fn enter(stats: Arc<PoolStats>) -> Self {
        stats.worker_started();
        Self(stats)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.worker_stopped();
    }
}
