//! # Fibonacci Backoff
//!
//! Per-resource retry delays after failed reconciliations.
//!
//! Delays follow the Fibonacci sequence starting at the minimum and are capped
//! at the maximum, so retries slow down more gently than with exponential
//! backoff. With the default 1s/300s bounds: 1s, 1s, 2s, 3s, 5s, 8s, ... 300s.
//!
//! ## Usage
//!
//! ```rust
//! use korifi_workload_runner::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 1);
//! assert_eq!(backoff.next_backoff_seconds(), 1);
//! assert_eq!(backoff.next_backoff_seconds(), 2);
//! assert_eq!(backoff.next_backoff_seconds(), 3);
//! ```

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Backoff starting at `min_secs` and never exceeding `max_secs`
    ///
    /// A zero minimum is raised to one second, otherwise the sequence would stay at zero.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs.min(max_secs.max(1)),
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Current delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);

        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);

        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Start over after a successful reconciliation
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}
