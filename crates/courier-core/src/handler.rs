//! Handler port: the caller-supplied work for an event.

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::HandlerError;
use crate::event::Event;

/// Per-attempt information passed alongside the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    pub worker_id: usize,

    /// 1-based attempt number.
    pub attempt: u32,

    /// When the worker stops waiting for this attempt, if the event has a
    /// timeout.
    pub deadline: Option<Instant>,
}

impl AttemptContext {
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Performs the work for one event.
///
/// The worker may call this up to `max_retries + 1` times for the same
/// event, once per attempt, so it must tolerate being retried. A payload the
/// handler cannot interpret should come back as
/// `HandlerError::InvalidPayload`; it is retried like any other failure.
#[async_trait]
pub trait EventHandler<P>: Send + Sync {
    async fn handle(&self, event: &Event<P>, ctx: &AttemptContext) -> Result<(), HandlerError>;
}
