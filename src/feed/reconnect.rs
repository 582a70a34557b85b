use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;

pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(10);

/// Capped exponential backoff without jitter: the Nth consecutive failure
/// waits `min(base * 2^(N-1), max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    /// Schedule that never gives up and never randomizes.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.max)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_RECONNECT_BASE,
            max: DEFAULT_RECONNECT_MAX,
        }
    }
}

/// Consecutive-failure counter driving a [`ReconnectPolicy`].
#[derive(Debug)]
pub struct Reconnect {
    policy: ReconnectPolicy,
    backoff: ExponentialBackoff,
    failures: u32,
}

impl Reconnect {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            backoff: policy.backoff(),
            failures: 0,
        }
    }

    pub fn on_open(&mut self) {
        self.backoff.reset();
        self.failures = 0;
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.backoff.next_backoff().unwrap_or(self.policy.max)
    }

    pub const fn failures(&self) -> u32 {
        self.failures
    }
}
