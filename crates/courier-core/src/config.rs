//! Pool and retry configuration.
//!
//! Plain serde structs; where the values come from (file, env) is up to the
//! embedding binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::RetryPolicy;

/// What a worker does with the event it owns when shutdown is raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Finish the owned event, retries included, then exit.
    #[default]
    Drain,

    /// Stop mid-attempt or mid-backoff and drop the event without a
    /// terminal status.
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub shutdown_policy: ShutdownPolicy,
    /// Upper bound on waiting for workers at shutdown; `None` waits forever.
    pub shutdown_timeout_ms: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            shutdown_policy: ShutdownPolicy::Drain,
            shutdown_timeout_ms: Some(30_000),
            retry: RetryConfig::default(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        self.retry.validate()
    }

    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_ms.map(Duration::from_millis)
    }
}

/// Default retry schedule stamped onto events built from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_delay_ms: 10_000,
            timeout_ms: Some(5_000),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_delay_ms < self.retry_delay_ms {
            return Err(ConfigError::DelayCapBelowInitial {
                retry_delay_ms: self.retry_delay_ms,
                max_delay_ms: self.max_delay_ms,
            });
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.shutdown_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_workers_rejected() {
        let config = PoolConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn cap_below_initial_delay_rejected() {
        let retry = RetryConfig {
            retry_delay_ms: 500,
            max_delay_ms: 100,
            ..Default::default()
        };
        assert!(matches!(
            retry.validate(),
            Err(ConfigError::DelayCapBelowInitial { .. })
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let retry = RetryConfig {
            timeout_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(retry.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn retry_config_builds_policy() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PoolConfig = serde_json::from_value(serde_json::json!({
            "worker_count": 5,
            "shutdown_policy": "abandon",
            "retry": { "max_retries": 1 }
        }))
        .unwrap();

        assert_eq!(config.worker_count, 5);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Abandon);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.retry_delay_ms, 1_000);
    }
}
