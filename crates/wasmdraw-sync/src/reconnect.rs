//! Reconnection policy with capped exponential backoff.

use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Default delay before the first reconnect attempt, in milliseconds.
pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 500;

/// Default cap on the delay between attempts, in milliseconds.
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

/// Default number of attempts before giving up.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 8;

/// How to react when the relay drops a connection we did not ask to close.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Attempts allowed per outage.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            multiplier: 2.0,
            max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Treat every close as terminal.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Delay before the given attempt (1-based), or `None` once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

/// Tracks the reconnect attempts of one outage.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
    due: Option<Instant>,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            due: None,
        }
    }

    /// Schedule the next attempt. Returns the attempt number and its delay,
    /// or `None` if the policy gives up.
    pub fn schedule(&mut self, now: Instant) -> Option<(u32, Duration)> {
        let attempt = self.attempt + 1;
        let delay = self.policy.delay_for(attempt)?;
        self.attempt = attempt;
        self.due = Some(now + delay);
        Some((attempt, delay))
    }

    /// Consume a due attempt. True at most once per `schedule`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    /// Check if an attempt is waiting for its deadline.
    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Check if we are inside an outage (at least one attempt made).
    pub fn in_progress(&self) -> bool {
        self.attempt > 0
    }

    /// Forget the outage, e.g. after the user closes the session or a
    /// connection opens successfully.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_for(6), Some(Duration::from_millis(10_000)));
        assert_eq!(policy.delay_for(8), Some(Duration::from_millis(10_000)));
        assert_eq!(policy.delay_for(9), None);
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn test_disabled_never_schedules() {
        let mut backoff = Backoff::new(ReconnectPolicy::disabled());
        assert!(backoff.schedule(Instant::now()).is_none());
        assert!(!backoff.in_progress());
    }

    #[test]
    fn test_take_due_fires_once() {
        let start = Instant::now();
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        assert_eq!(backoff.schedule(start), Some((1, Duration::from_millis(500))));

        assert!(!backoff.take_due(start + Duration::from_millis(499)));
        assert!(backoff.take_due(start + Duration::from_millis(500)));
        assert!(!backoff.take_due(start + Duration::from_secs(5)));
        assert!(backoff.in_progress());
    }

    #[test]
    fn test_budget_exhausts() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            ..Default::default()
        };
        let mut backoff = Backoff::new(policy);
        let now = Instant::now();
        assert!(backoff.schedule(now).is_some());
        assert!(backoff.schedule(now).is_some());
        assert!(backoff.schedule(now).is_none());

        backoff.reset();
        assert_eq!(backoff.schedule(now).map(|(attempt, _)| attempt), Some(1));
    }
}
