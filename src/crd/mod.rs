//! # Custom Resource Definitions
//!
//! CRD types for the workload runner, group `eirini.cloudfoundry.org/v1`.
//!
//! ## Module Structure
//!
//! - `lrp.rs` - long-running processes, converted into StatefulSets
//! - `task.rs` - one-shot tasks, converted into Jobs
//! - `registry.rs` - private registry credentials shared by both

mod lrp;
mod registry;
mod task;

pub use lrp::{Healthcheck, Lrp, LrpSpec, LrpStatus, Sidecar, VolumeMount};
pub use registry::PrivateRegistry;
pub use task::{ExecutionStatus, Task, TaskSpec, TaskStatus};

use schemars::{json_schema, Schema, SchemaGenerator};

/// Schema for `core/v1` env var lists embedded in specs
///
/// The API server prunes unknown fields, so the items keep their fields
/// instead of being validated against the full `EnvVar` schema.
pub(crate) fn env_vars_schema(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "array",
        "description": "Environment variables using the core/v1 EnvVar shape (secret and field references included).",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}
