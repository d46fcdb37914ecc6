//! # LRP
//!
//! Desired state of a Cloud Foundry process. `guid` + `version` identify one
//! generation of the process: a new version produces a new StatefulSet, while
//! `image` and `instances` are the only fields users may change in place.

use super::PrivateRegistry;
use k8s_openapi::api::core::v1::EnvVar;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// LRP Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: eirini.cloudfoundry.org/v1
/// kind: LRP
/// metadata:
///   name: dora-web
///   namespace: cf-space-1
/// spec:
///   guid: 0ff9c3a8-web
///   version: "0"
///   processType: web
///   appGUID: 0ff9c3a8
///   appName: dora
///   spaceName: dev
///   image: eirini/dorini
///   instances: 2
///   memoryMB: 256
///   diskMB: 512
///   ports: [8080]
///   health:
///     type: port
///     port: 8080
///     timeoutMs: 3000
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "LRP",
    root = "Lrp",
    group = "eirini.cloudfoundry.org",
    version = "v1",
    namespaced,
    status = "LrpStatus",
    shortname = "lrp",
    printcolumn = r#"{"name":"Instances", "type":"integer", "jsonPath":".spec.instances"}, {"name":"Ready", "type":"integer", "jsonPath":".status.replicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LrpSpec {
    pub guid: String,
    pub version: String,
    #[serde(default)]
    pub process_type: String,
    #[serde(rename = "appGUID", default)]
    pub app_guid: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(rename = "spaceGUID", default)]
    pub space_guid: String,
    #[serde(default)]
    pub space_name: String,
    #[serde(rename = "orgGUID", default)]
    pub org_guid: String,
    #[serde(default)]
    pub org_name: String,
    /// Plain environment variables. Prefer `environment`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    #[schemars(schema_with = "super::env_vars_schema")]
    pub environment: Vec<EnvVar>,
    #[serde(default)]
    pub command: Vec<String>,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_registry: Option<PrivateRegistry>,
    #[serde(default)]
    pub ports: Vec<i32>,
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub instances: i32,
    #[serde(rename = "memoryMB", default)]
    pub memory_mb: i64,
    #[serde(rename = "diskMB")]
    #[schemars(range(min = 1))]
    pub disk_mb: i64,
    /// Relative CPU share, mapped one-to-one onto millicores
    #[serde(default)]
    pub cpu_weight: u8,
    #[serde(default)]
    pub sidecars: Vec<Sidecar>,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default)]
    pub health: Healthcheck,
    #[serde(default)]
    pub user_defined_annotations: BTreeMap<String, String>,
}

impl LrpSpec {
    /// Identifier shared by all instances of one process version
    #[must_use]
    pub fn process_guid(&self) -> String {
        format!("{}-{}", self.guid, self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    pub name: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(rename = "memoryMB", default)]
    pub memory_mb: i64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub claim_name: String,
    pub mount_path: String,
}

/// Health check descriptor; `type` is one of `http`, `port` or `process`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Healthcheck {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub timeout_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LrpStatus {
    /// Ready replicas of the backing StatefulSet
    #[serde(default)]
    pub replicas: i32,
}
