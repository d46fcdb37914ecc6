//! # Korifi Workload Runner
//!
//! Kubernetes controller that runs Cloud Foundry workloads.
//!
//! ## Overview
//!
//! 1. **LRPs** - each LRP version becomes a StatefulSet with a pod disruption budget
//! 2. **Tasks** - each Task becomes a Job whose status is mirrored back into the Task
//! 3. **Crashes** - crashed LRP instances are reported as Events on their LRP
//! 4. **Admission** - pods get `CF_INSTANCE_INDEX` injected; immutable LRP fields are guarded
//!
//! Configuration comes from environment variables, see [`korifi_workload_runner::config`].

use anyhow::Result;
use korifi_workload_runner::runtime::{self, initialization::initialize};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    runtime::run(init).await
}
