//! # Events
//!
//! Crash detection for LRP pods.

mod crash;

pub use crash::{CrashEvent, CrashEventGenerator, DefaultCrashEventGenerator};
