//! # Workloads
//!
//! Native Kubernetes objects that run LRPs and Tasks.
//!
//! ## Module Structure
//!
//! - `naming.rs` - deterministic StatefulSet and Job names
//! - `docker.rs` - docker config payloads and registry hosts
//! - `env.rs` - container environment variables
//! - `resources.rs` - memory, disk and CPU quantities
//! - `registry.rs` - private registry pull secrets
//! - `stset/` - LRP StatefulSets, their updates and disruption budgets
//! - `jobs/` - Task Jobs and their status

pub mod docker;
pub mod env;
pub mod jobs;
pub mod naming;
pub mod registry;
pub mod resources;
pub mod stset;
