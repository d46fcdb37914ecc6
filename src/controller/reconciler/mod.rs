//! # Reconcilers
//!
//! Level-triggered reconcilers for the three watched resources.
//!
//! - `lrp.rs` - LRP to StatefulSet
//! - `task.rs` - Task to Job, status and TTL cleanup
//! - `pod_crash.rs` - LRP instance crashes to Events
//! - `types.rs` - error type and per-resource backoff state
//!
//! Each reconciler fetches the object by namespace and name, so every call is
//! safe to repeat from scratch.

mod lrp;
mod pod_crash;
mod task;
mod types;

pub use lrp::LrpReconciler;
pub use pod_crash::PodCrashReconciler;
pub use task::TaskReconciler;
pub use types::{BackoffState, ControllerContext, ReconcilerError};
