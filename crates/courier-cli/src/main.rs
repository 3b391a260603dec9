mod config;
mod notify;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use courier_core::{Event, EventQueue, MemoryStatusSink, ShutdownSignal, WorkerPool};
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::notify::EmailHandler;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,courier_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Poll the status sink until every seeded event is terminal or time is up.
async fn wait_for_terminal(sink: &MemoryStatusSink, expected: usize, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        let done = sink
            .snapshot()
            .status_list
            .values()
            .filter(|status| *status == "Sent" || *status == "Failed")
            .count();
        if done >= expected {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(50)).await;
    }
}

/// Shut the pool down and write the status report. The report is written
/// even when shutdown fails; the shutdown error is returned afterwards.
async fn stop_and_report<P>(
    pool: &mut WorkerPool<P>,
    signal: &ShutdownSignal,
    timeout: Option<Duration>,
    sink: &MemoryStatusSink,
    out: &mut impl Write,
) -> Result<()>
where
    P: Send + Sync + 'static,
{
    let stopped = match timeout {
        Some(timeout) => pool.shutdown_with_timeout(signal, timeout).await,
        None => pool.shutdown(signal).await,
    };

    let report = serde_json::to_string_pretty(&sink.snapshot())?;
    writeln!(out, "{report}").context("failed to write status report")?;
    stopped.context("worker pool did not shut down cleanly")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load()?;
    info!(
        workers = config.pool.worker_count,
        events = config.demo.events,
        smtp = %config.mail.address(),
        "starting notification dispatcher"
    );

    // (A) queue, sink and handler
    let queue = Arc::new(EventQueue::new());
    let sink = Arc::new(MemoryStatusSink::new());
    let handler = Arc::new(EmailHandler::new(
        config.mail.clone(),
        config.demo.simulated_failures,
    ));

    // (B) seed events with the configured retry schedule
    let policy = config.pool.retry.policy();
    queue.enqueue_all((1..=config.demo.events).map(|i| {
        Event::new(
            format!("email-event-{i}"),
            json!({ "body": format!("Thank you for your order #{i}!") }),
        )
        .with_policy(policy)
    }));

    // (C) start workers
    let mut pool = WorkerPool::from_config(&config.pool, queue.clone(), handler)?
        .with_sink(sink.clone());
    let signal = ShutdownSignal::new();
    pool.start(&signal)?;

    // (D) run until everything is terminal, time runs out, or Ctrl-C
    let run_for = Duration::from_millis(config.demo.run_for_ms);
    tokio::select! {
        finished = wait_for_terminal(&sink, config.demo.events, run_for) => {
            if !finished {
                warn!(
                    run_for_ms = config.demo.run_for_ms,
                    "run window elapsed before all events finished"
                );
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("interrupted");
        }
    }

    // (E) shut down and report
    let timeout = config.pool.shutdown_timeout();
    stop_and_report(&mut pool, &signal, timeout, &sink, &mut std::io::stdout()).await?;

    info!(stats = ?pool.stats(), left_in_queue = queue.size(), "all workers have stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use courier_core::{AttemptContext, EventHandler, EventStatus, HandlerError, StatusSink};

    use super::*;

    struct StuckHandler;

    #[async_trait]
    impl EventHandler<u32> for StuckHandler {
        async fn handle(
            &self,
            _event: &Event<u32>,
            _ctx: &AttemptContext,
        ) -> Result<(), HandlerError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn report_is_written_when_shutdown_times_out() {
        let queue = Arc::new(EventQueue::<u32>::new());
        queue.enqueue(Event::new("email-event-1", 1));
        let sink = Arc::new(MemoryStatusSink::new());
        sink.report(&"email-event-0".into(), &EventStatus::Sent);
        let mut pool = WorkerPool::new(1, queue.clone(), Arc::new(StuckHandler))
            .unwrap()
            .with_sink(sink.clone());
        let signal = ShutdownSignal::new();
        pool.start(&signal).unwrap();
        while !queue.is_empty() {
            sleep(Duration::from_millis(5)).await;
        }

        let mut out = Vec::new();
        let result = stop_and_report(
            &mut pool,
            &signal,
            Some(Duration::from_millis(50)),
            &sink,
            &mut out,
        )
        .await;

        assert!(result.is_err());
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("statusList"));
        assert!(report.contains("email-event-0"));

        pool.abort();
    }
}
