//! # StatefulSets
//!
//! LRPs run as StatefulSets, one per LRP version.
//!
//! - `convert.rs` - LRP to StatefulSet mapping
//! - `probe.rs` - liveness and readiness probes
//! - `desire.rs` - first creation of a version's StatefulSet
//! - `update.rs` - replica and image changes on an existing StatefulSet
//! - `pdb.rs` - pod disruption budgets

mod convert;
mod desire;
mod pdb;
mod probe;
mod update;

pub use convert::{statefulset_label_selector, LrpToStatefulSet, LrpToStatefulSetConverter};
pub use desire::{LrpDesirer, StatefulSetDesirer};
pub use pdb::{pod_disruption_budget, PdbUpdater, PodDisruptionBudgetUpdater};
pub use probe::{create_liveness_probe, create_readiness_probe, ProbeCreator};
pub use update::{statefulset_patch, LrpUpdater, StatefulSetUpdater};
