//! # Types
//!
//! Types shared by the reconcilers and the controller runtime.

use crate::controller::backoff::FibonacciBackoff;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0:#}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared state of one controller: its reconciler and per-resource backoff
pub struct ControllerContext<R> {
    /// Controller name used in spans and metric labels
    pub name: &'static str,
    pub reconciler: R,
    // Keyed by namespace/name
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl<R> std::fmt::Debug for ControllerContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("name", &self.name)
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl<R> ControllerContext<R> {
    pub fn new(name: &'static str, reconciler: R, backoff_min_secs: u64, backoff_max_secs: u64) -> Self {
        Self {
            name,
            reconciler,
            backoff_states: Mutex::new(HashMap::new()),
            backoff_min_secs,
            backoff_max_secs,
        }
    }

    /// Record a failure of the resource; returns the next delay in seconds and the error count
    pub fn record_error(&self, resource_key: &str) -> Option<(u64, u32)> {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(self.backoff_min_secs, self.backoff_max_secs));
                state.increment_error();
                Some((state.backoff.next_backoff_seconds(), state.error_count))
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                None
            }
        }
    }

    /// Forget the backoff of a resource after it reconciled successfully
    pub fn reset_backoff(&self, resource_key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(resource_key);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }
}
