//! Resource quantities of workload containers.
//!
//! Memory and disk are exact binary quantities. CPU is a request only, one
//! millicore per unit of CPU weight.

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

const BINARY_SUFFIXES: [&str; 5] = ["Mi", "Gi", "Ti", "Pi", "Ei"];

/// `mib` mebibytes in canonical form (`256Mi`, `1Gi`, `1536Mi`)
#[must_use]
pub fn mebibyte_quantity(mib: i64) -> Quantity {
    if mib == 0 {
        return Quantity("0".to_string());
    }
    let mut value = mib;
    let mut suffix = 0;
    while value % 1024 == 0 && suffix < BINARY_SUFFIXES.len() - 1 {
        value /= 1024;
        suffix += 1;
    }
    Quantity(format!("{value}{}", BINARY_SUFFIXES[suffix]))
}

#[must_use]
pub fn cpu_millicores(cpu_weight: u8) -> Quantity {
    if cpu_weight == 0 {
        Quantity("0".to_string())
    } else {
        Quantity(format!("{cpu_weight}m"))
    }
}

/// Memory limit equals the request; no CPU limit
#[must_use]
pub fn container_resources(cpu_weight: u8, memory_mb: i64, disk_mb: i64) -> ResourceRequirements {
    let memory = mebibyte_quantity(memory_mb);
    ResourceRequirements {
        limits: Some(BTreeMap::from([
            ("memory".to_string(), memory.clone()),
            ("ephemeral-storage".to_string(), mebibyte_quantity(disk_mb)),
        ])),
        requests: Some(BTreeMap::from([
            ("memory".to_string(), memory),
            ("cpu".to_string(), cpu_millicores(cpu_weight)),
        ])),
        ..ResourceRequirements::default()
    }
}
