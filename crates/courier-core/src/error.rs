use std::time::Duration;

use thiserror::Error;

/// Returned by the non-blocking queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
}

/// A failed attempt reported by a handler (or synthesized by the worker).
///
/// Every variant is retried the same way; the worker does not distinguish
/// transient from permanent failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be positive, got {0}")]
    InvalidWorkerCount(usize),

    #[error("worker pool already started")]
    AlreadyStarted,

    #[error("worker {worker_id} panicked: {message}")]
    WorkerPanicked { worker_id: usize, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("workers did not stop within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker_count must be positive")]
    NoWorkers,

    #[error("max_delay_ms ({max_delay_ms}) is smaller than retry_delay_ms ({retry_delay_ms})")]
    DelayCapBelowInitial { retry_delay_ms: u64, max_delay_ms: u64 },

    #[error("timeout_ms must be positive when set")]
    ZeroTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        assert_eq!(QueueError::Empty.to_string(), "queue is empty");
        assert_eq!(
            HandlerError::failed("smtp down").to_string(),
            "handler failed: smtp down"
        );
        let err = PoolError::WorkerPanicked {
            worker_id: 2,
            message: "boom".into(),
        };
        assert!(err.to_string().contains("worker 2"));
    }
}
