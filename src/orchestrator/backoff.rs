//! Contention backoff.

use std::time::Duration;

/// Exponential delay between acquire attempts on a contended host.
///
/// Starts at the initial delay and doubles up to the cap: with the defaults
/// that is 2, 4, 8, 16, 16, ... seconds.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.max);
        self.next = delay.saturating_mul(2).min(self.max);
        delay
    }
}
