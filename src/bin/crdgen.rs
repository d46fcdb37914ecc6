//! # CRD Generator
//!
//! Prints the `LRP` and `Task` CustomResourceDefinitions as YAML.
//!
//! ## Usage
//!
//! ```bash
//! # Generate both CRDs
//! cargo run --bin crdgen > config/crd/workloads.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen -- --kind lrp | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use korifi_workload_runner::crd::{Lrp, Task};
use kube::core::CustomResourceExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Lrp,
    Task,
    All,
}

/// Print the workload runner CRDs
#[derive(Debug, Parser)]
#[command(name = "crdgen", about = "Print the workload runner CustomResourceDefinitions", long_about = None)]
struct Cli {
    /// Which CRD to print
    #[arg(short, long, value_enum, default_value_t = Kind::All)]
    kind: Kind,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut documents = Vec::new();
    if matches!(cli.kind, Kind::Lrp | Kind::All) {
        documents.push(serde_yaml::to_string(&Lrp::crd()).context("Failed to serialize LRP CRD")?);
    }
    if matches!(cli.kind, Kind::Task | Kind::All) {
        documents.push(serde_yaml::to_string(&Task::crd()).context("Failed to serialize Task CRD")?);
    }

    print!("{}", documents.join("---\n"));
    Ok(())
}
