//! Capped exponential backoff between rediscovery attempts.

use std::time::Duration;

use rand::Rng;

/// First non-zero delay.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Upper bound for any single delay.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay policy for consecutive failed cycles of one thread session.
///
/// Attempt `0` is always immediate. Attempt `n` waits `initial * 2^(n-1)`,
/// capped at `max`. With jitter enabled the delay is drawn uniformly from the
/// upper half of that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_DELAY, MAX_DELAY)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max: max.max(initial), jitter: true }
    }

    /// Disable jitter, making [`delay`](Self::delay) deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Nominal (un-jittered) delay for `attempt`.
    pub fn nominal(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal(attempt);
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }
        let ms = nominal.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(ms / 2..=ms))
    }
}
