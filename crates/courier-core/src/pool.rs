//! Worker pool: a fixed set of interchangeable workers sharing one queue,
//! one handler and one shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{PoolConfig, ShutdownPolicy};
use crate::error::PoolError;
use crate::handler::EventHandler;
use crate::queue::EventQueue;
use crate::shutdown::ShutdownSignal;
use crate::sink::{NoopStatusSink, StatusSink};
use crate::stats::{PoolStats, StatsSnapshot};
use crate::worker::Worker;

/// Pool handle.
/// - `start` spawns the workers and returns immediately
/// - `shutdown` raises the signal and waits for every worker
/// - `wait` only waits, whoever raised the signal
pub struct WorkerPool<P> {
    worker_count: usize,
    queue: Arc<EventQueue<P>>,
    handler: Arc<dyn EventHandler<P>>,
    sink: Arc<dyn StatusSink>,
    shutdown_policy: ShutdownPolicy,
    stats: Arc<PoolStats>,
    signal: Option<ShutdownSignal>,
    joins: Vec<(usize, JoinHandle<()>)>,
}

impl<P> WorkerPool<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(
        worker_count: usize,
        queue: Arc<EventQueue<P>>,
        handler: Arc<dyn EventHandler<P>>,
    ) -> Result<Self, PoolError> {
        if worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount(worker_count));
        }
        Ok(Self {
            worker_count,
            queue,
            handler,
            sink: Arc::new(NoopStatusSink),
            shutdown_policy: ShutdownPolicy::default(),
            stats: Arc::new(PoolStats::default()),
            signal: None,
            joins: Vec::with_capacity(worker_count),
        })
    }

    pub fn from_config(
        config: &PoolConfig,
        queue: Arc<EventQueue<P>>,
        handler: Arc<dyn EventHandler<P>>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let pool = Self::new(config.worker_count, queue, handler)?;
        Ok(pool.with_shutdown_policy(config.shutdown_policy))
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    /// Spawn one task per worker. Must run inside a tokio runtime.
    pub fn start(&mut self, signal: &ShutdownSignal) -> Result<(), PoolError> {
        if self.signal.is_some() {
            return Err(PoolError::AlreadyStarted);
        }
        self.signal = Some(signal.clone());

        info!(
            worker_count = self.worker_count,
            policy = ?self.shutdown_policy,
            "starting worker pool"
        );

        for worker_id in 1..=self.worker_count {
            let worker = Worker::new(
                worker_id,
                Arc::clone(&self.queue),
                Arc::clone(&self.handler),
                Arc::clone(&self.sink),
                Arc::clone(&self.stats),
                self.shutdown_policy,
                signal.subscribe(),
            );
            self.joins.push((worker_id, tokio::spawn(worker.run())));
        }
        Ok(())
    }

    /// Raise the signal and wait for all workers to exit.
    pub async fn shutdown(&mut self, signal: &ShutdownSignal) -> Result<(), PoolError> {
        info!("shutting down worker pool");
        self.raise(signal);
        self.wait().await?;
        info!(queued = self.queue.size(), "worker pool has been shut down");
        Ok(())
    }

    /// Like `shutdown`, but gives up after `timeout`. Workers that have not
    /// exited keep running; `abort` stops them.
    pub async fn shutdown_with_timeout(
        &mut self,
        signal: &ShutdownSignal,
        timeout: Duration,
    ) -> Result<(), PoolError> {
        self.raise(signal);
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_elapsed) => {
                error!(
                    timeout_ms = timeout.as_millis() as u64,
                    remaining = self.joins.len(),
                    "worker shutdown timed out, some workers may still be running"
                );
                Err(PoolError::ShutdownTimeout { timeout })
            }
        }
    }

    /// Raise `signal` and the one the workers were started with, in case
    /// the caller passed a different one.
    fn raise(&self, signal: &ShutdownSignal) {
        signal.trigger();
        if let Some(started_with) = &self.signal {
            started_with.trigger();
        }
    }

    /// Wait until every worker has exited.
    ///
    /// Every worker is joined even if one panicked; the first panic is
    /// returned.
    pub async fn wait(&mut self) -> Result<(), PoolError> {
        let mut first_panic = None;

        // Join in place so a cancelled wait (timeout) leaves the rest joinable.
        while let Some((worker_id, join)) = self.joins.first_mut() {
            let worker_id = *worker_id;
            let result = join.await;
            self.joins.remove(0);

            match result {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    error!(worker_id, error = %e, "worker panicked");
                    if first_panic.is_none() {
                        first_panic = Some(PoolError::WorkerPanicked {
                            worker_id,
                            message: e.to_string(),
                        });
                    }
                }
                Err(e) => {
                    warn!(worker_id, error = %e, "worker task cancelled");
                }
            }
        }

        match first_panic {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Forcefully stop workers that are still running.
    pub fn abort(&mut self) {
        for (_, join) in &self.joins {
            join.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.joins.iter().any(|(_, join)| !join.is_finished())
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue(&self) -> &Arc<EventQueue<P>> {
        &self.queue
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<P> Drop for WorkerPool<P> {
    fn drop(&mut self) {
        let active = self.joins.iter().filter(|(_, join)| !join.is_finished()).count();
        if active == 0 {
            return;
        }
        if let Some(signal) = &self.signal
            && !signal.is_triggered()
        {
            warn!(
                active_workers = active,
                "worker pool dropped without shutdown, raising shutdown signal"
            );
            signal.trigger();
        }
    }
}
