use std::time::{Duration, Instant};

/// Reconnect backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Upper bound for the delay.
    pub max: Duration,
    /// Growth factor applied per consecutive failure.
    pub factor: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2,
        }
    }
}

/// Bounded exponential backoff between connection attempts.
///
/// Tracks consecutive failures and the earliest instant the next attempt is
/// allowed. It never sleeps; callers ask [`Backoff::ready`] on each tick.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
            next_attempt: None,
        }
    }

    /// Whether an attempt is allowed at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    /// Record a failed attempt and return the delay until the next one.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let delay = self.delay();
        self.failures = self.failures.saturating_add(1);
        self.next_attempt = Some(now + delay);
        delay
    }

    /// Forget past failures; the next attempt is allowed immediately.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay that the next failure will impose.
    pub fn delay(&self) -> Duration {
        let mut delay = self.config.initial;
        for _ in 0..self.failures {
            delay = delay.saturating_mul(self.config.factor.max(1));
            if delay >= self.config.max {
                return self.config.max;
            }
        }
        delay.min(self.config.max)
    }
}
