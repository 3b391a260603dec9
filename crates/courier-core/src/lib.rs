//! courier-core
//!
//! In-process background task queue: producers enqueue events, a fixed pool
//! of workers drains them, calls a handler per event and retries failures
//! with capped exponential backoff.
//!
//! # Modules
//! - **event**: `Event<P>`, `EventId`, `RetryPolicy`
//! - **queue**: `EventQueue` (mutex-guarded FIFO with wake-on-enqueue)
//! - **handler**: `EventHandler` port and `AttemptContext`
//! - **sink**: `StatusSink` port, `MemoryStatusSink`
//! - **worker**: per-event retry state machine
//! - **pool**: `WorkerPool` lifecycle
//! - **shutdown**: `ShutdownSignal` broadcast
//! - **backoff**, **config**, **stats**, **error**
//!
//! Not durable: events live only in memory and are gone when the process
//! exits.

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod pool;
pub mod queue;
pub mod shutdown;
pub mod sink;
pub mod stats;
pub mod worker;

pub use self::backoff::Backoff;
pub use self::config::{PoolConfig, RetryConfig, ShutdownPolicy};
pub use self::error::{ConfigError, HandlerError, PoolError, QueueError};
pub use self::event::{Event, EventId, RetryPolicy};
pub use self::handler::{AttemptContext, EventHandler};
pub use self::pool::WorkerPool;
pub use self::queue::EventQueue;
pub use self::shutdown::{ShutdownListener, ShutdownSignal};
pub use self::sink::{EventStatus, MemoryStatusSink, NoopStatusSink, StatusSink, StatusSnapshot};
pub use self::stats::{PoolStats, StatsSnapshot};
pub use self::worker::{Outcome, Worker};
