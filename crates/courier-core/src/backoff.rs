//! Exponential backoff between retry attempts.

use std::time::Duration;

use crate::event::RetryPolicy;

/// Delay schedule for one event's retries.
///
/// Starts at `retry_delay` and doubles after every use, saturating at
/// `max_delay`. The cap also applies to the first delay.
///
/// Example with retry_delay=1s, max_delay=10s:
/// - 1st failure: 1s
/// - 2nd: 2s
/// - 3rd: 4s
/// - 4th: 8s
/// - 5th: 10s
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub fn new(retry_delay: Duration, max_delay: Duration) -> Self {
        Self {
            current: retry_delay.min(max_delay),
            max_delay,
        }
    }

    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::new(policy.retry_delay, policy.max_delay)
    }

    /// Delay the next sleep would use, without advancing.
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Return the current delay and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = delay.saturating_mul(2).min(self.max_delay);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
