//! Korifi Workload Runner Library
//!
//! Runs Cloud Foundry workloads on Kubernetes: LRPs as StatefulSets, Tasks as
//! Jobs, and reports crashes of LRP instances as Events.
//!
//! ## Quick Start
//!
//! ```rust
//! use korifi_workload_runner::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod event;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
pub mod time;
pub mod webhook;
pub mod workload;
