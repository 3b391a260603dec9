//! Event: task identity plus retry bookkeeping.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Caller-supplied event identifier.
///
/// The queue never deduplicates; uniqueness is up to the producer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-sortable id for producers without their own ids.
    pub fn generate() -> Self {
        Self(format!("evt-{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Retry schedule carried by each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Ceiling on `Event::retry_count`. The handler runs at most
    /// `max_retries + 1` times.
    pub max_retries: u32,

    /// Delay before the second attempt.
    pub retry_delay: Duration,

    /// Upper bound the backoff saturates at.
    pub max_delay: Duration,

    /// Deadline applied to each handler invocation.
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            timeout: None,
        }
    }
}

/// A unit of work.
///
/// Owned by the queue while enqueued, then by exactly one worker, which
/// mutates `retry_count` in place until the event is terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P> {
    id: EventId,
    payload: P,
    retry_count: u32,
    policy: RetryPolicy,
}

impl<P> Event<P> {
    pub fn new(id: impl Into<EventId>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            retry_count: 0,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.policy.retry_delay = retry_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.policy.max_delay = max_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 1-based number of the attempt about to run (or running).
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.policy.max_retries
    }

    /// Count a failed attempt. Returns false (and leaves the count alone)
    /// once the ceiling is reached.
    pub fn record_failure(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.retry_count += 1;
        true
    }
}
