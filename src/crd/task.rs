//! # Task
//!
//! A one-shot command run to completion in a Job. Tasks have no version and
//! are never re-diffed: once desired, only their status moves forward.

use super::PrivateRegistry;
use k8s_openapi::api::core::v1::EnvVar;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Task",
    group = "eirini.cloudfoundry.org",
    version = "v1",
    namespaced,
    status = "TaskStatus",
    shortname = "task",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.executionStatus"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_registry: Option<PrivateRegistry>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    #[schemars(schema_with = "super::env_vars_schema")]
    pub environment: Vec<EnvVar>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub app_name: String,
    #[serde(rename = "appGUID", default)]
    pub app_guid: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(rename = "orgGUID", default)]
    pub org_guid: String,
    #[serde(default)]
    pub space_name: String,
    #[serde(rename = "spaceGUID", default)]
    pub space_guid: String,
    #[serde(rename = "memoryMB", default)]
    pub memory_mb: i64,
    #[serde(rename = "diskMB", default)]
    pub disk_mb: i64,
    #[serde(default)]
    pub cpu_weight: u8,
}

/// Task lifecycle: starting -> running -> succeeded | failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Starting,
    Running,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Succeeded | ExecutionStatus::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// RFC3339 time the Job started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// RFC3339 time the Job finished, successfully or not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub execution_status: ExecutionStatus,
}

impl TaskStatus {
    /// A task is complete once it reached a terminal status and recorded when
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.execution_status.is_terminal() && self.end_time.is_some()
    }
}
