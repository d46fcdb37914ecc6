//! # Controller
//!
//! - `backoff`: Fibonacci backoff for retries after failed reconciliations
//! - `reconciler`: LRP, Task and pod crash reconcilers

pub mod backoff;
pub mod reconciler;
