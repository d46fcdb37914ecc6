//! Environment variables of workload containers.

use crate::constants::{ENV_CF_INSTANCE_GUID, ENV_CF_INSTANCE_INTERNAL_IP, ENV_CF_INSTANCE_IP, ENV_POD_NAME};
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector};
use std::collections::BTreeMap;

/// Plain `name=value` variables, ordered by name
#[must_use]
pub fn map_to_env_vars(env: &BTreeMap<String, String>) -> Vec<EnvVar> {
    env.iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..EnvVar::default()
        })
        .collect()
}

/// Variable resolved by the kubelet from a pod field
#[must_use]
pub fn field_ref_env_var(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

/// Pod identity variables appended to every workload container
#[must_use]
pub fn instance_field_env_vars() -> Vec<EnvVar> {
    vec![
        field_ref_env_var(ENV_POD_NAME, "metadata.name"),
        field_ref_env_var(ENV_CF_INSTANCE_GUID, "metadata.uid"),
        field_ref_env_var(ENV_CF_INSTANCE_IP, "status.hostIP"),
        field_ref_env_var(ENV_CF_INSTANCE_INTERNAL_IP, "status.podIP"),
    ]
}

/// Map variables, then structured ones, then the pod identity field refs
#[must_use]
pub fn workload_env_vars(env: &BTreeMap<String, String>, environment: &[EnvVar]) -> Vec<EnvVar> {
    let mut vars = map_to_env_vars(env);
    vars.extend(environment.iter().cloned());
    vars.extend(instance_field_env_vars());
    vars
}

/// Plain variable with a literal value
#[must_use]
pub fn value_env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..EnvVar::default()
    }
}
