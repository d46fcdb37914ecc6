//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use korifi_workload_runner::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconcilers
pub use crate::controller::reconciler::{
    BackoffState, ControllerContext, LrpReconciler, PodCrashReconciler, ReconcilerError,
    TaskReconciler,
};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig, WorkloadConfig};

// Kubernetes access
pub use crate::store::{KubeApiStore, KubeStore, ListSelector, StoreError};

// Workload collaborators
pub use crate::event::{CrashEvent, CrashEventGenerator};
pub use crate::workload::jobs::{TaskDesirer, TaskToJobConverter};
pub use crate::workload::stset::{LrpDesirer, LrpToStatefulSetConverter, LrpUpdater, PdbUpdater};

pub use crate::errors::ErrorList;
