//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Label and annotation keys are part of the contract with the rest of the
//! platform (API layer, log cache, route controller) and must not change.
//! Defaults can be overridden via environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTPS port for the admission webhooks
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default minimum backoff after a failed reconciliation (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default maximum backoff after a failed reconciliation (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default time a finished task's Job is kept around (30 days)
pub const DEFAULT_TASK_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default service account for application pods
pub const DEFAULT_APPLICATION_SERVICE_ACCOUNT: &str = "eirini";

/// Default image pull secret attached to every workload
pub const DEFAULT_REGISTRY_SECRET_NAME: &str = "app-registry-credentials";

// Container names

/// Name of the application container inside LRP pods
pub const APPLICATION_CONTAINER_NAME: &str = "opi";

/// Name of the task container inside Job pods
pub const TASK_CONTAINER_NAME: &str = "opi-task";

// Source types

pub const APP_SOURCE_TYPE: &str = "APP";
pub const TASK_SOURCE_TYPE: &str = "TASK";

// Labels

pub const LABEL_GUID: &str = "korifi.cloudfoundry.org/guid";
pub const LABEL_VERSION: &str = "korifi.cloudfoundry.org/version";
pub const LABEL_APP_GUID: &str = "korifi.cloudfoundry.org/app-guid";
pub const LABEL_PROCESS_TYPE: &str = "korifi.cloudfoundry.org/process-type";
pub const LABEL_SOURCE_TYPE: &str = "korifi.cloudfoundry.org/source-type";
pub const LABEL_ORG_GUID: &str = "korifi.cloudfoundry.org/org-guid";
pub const LABEL_ORG_NAME: &str = "korifi.cloudfoundry.org/org-name";
pub const LABEL_SPACE_GUID: &str = "korifi.cloudfoundry.org/space-guid";
pub const LABEL_SPACE_NAME: &str = "korifi.cloudfoundry.org/space-name";
pub const LABEL_TASK_NAME: &str = "korifi.cloudfoundry.org/name";
pub const LABEL_INSTANCE_INDEX: &str = "korifi.cloudfoundry.org/instance-index";

// Annotations

pub const ANNOTATION_APP_NAME: &str = "korifi.cloudfoundry.org/application-name";
pub const ANNOTATION_VERSION: &str = "korifi.cloudfoundry.org/version";
pub const ANNOTATION_APP_ID: &str = "korifi.cloudfoundry.org/application-id";
pub const ANNOTATION_SPACE_NAME: &str = "korifi.cloudfoundry.org/space-name";
pub const ANNOTATION_SPACE_GUID: &str = "korifi.cloudfoundry.org/space-guid";
pub const ANNOTATION_ORG_NAME: &str = "korifi.cloudfoundry.org/org-name";
pub const ANNOTATION_ORG_GUID: &str = "korifi.cloudfoundry.org/org-guid";
pub const ANNOTATION_PROCESS_GUID: &str = "korifi.cloudfoundry.org/process-guid";
pub const ANNOTATION_GUID: &str = "korifi.cloudfoundry.org/guid";
pub const ANNOTATION_TASK_CONTAINER_NAME: &str = "korifi.cloudfoundry.org/opi-task-container-name";
pub const ANNOTATION_LAST_REPORTED_LRP_CRASH: &str =
    "korifi.cloudfoundry.org/last-reported-lrp-crash";

/// Pod-level seccomp annotation and the profile applied to every workload
pub const SECCOMP_POD_ANNOTATION: &str = "seccomp.security.alpha.kubernetes.io/pod";
pub const SECCOMP_PROFILE_RUNTIME_DEFAULT: &str = "runtime/default";

// Environment variables injected into workload containers

pub const ENV_POD_NAME: &str = "POD_NAME";
pub const ENV_CF_INSTANCE_GUID: &str = "CF_INSTANCE_GUID";
pub const ENV_CF_INSTANCE_IP: &str = "CF_INSTANCE_IP";
pub const ENV_CF_INSTANCE_INTERNAL_IP: &str = "CF_INSTANCE_INTERNAL_IP";
pub const ENV_CF_INSTANCE_INDEX: &str = "CF_INSTANCE_INDEX";
pub const ENV_CF_INSTANCE_ADDR: &str = "CF_INSTANCE_ADDR";
pub const ENV_CF_INSTANCE_PORT: &str = "CF_INSTANCE_PORT";
pub const ENV_CF_INSTANCE_PORTS: &str = "CF_INSTANCE_PORTS";

// Private registry secrets

pub const PRIVATE_REGISTRY_SECRET_GENERATE_NAME: &str = "private-registry-";
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";
pub const DOCKER_CONFIG_SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";
pub const DOCKER_HUB_HOST: &str = "index.docker.io/v1/";

// Scheduling

pub const POD_AFFINITY_TERM_WEIGHT: i32 = 100;
pub const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// PDBs are only created above this instance count
pub const PDB_INSTANCE_THRESHOLD: i32 = 1;
pub const PDB_MIN_AVAILABLE: &str = "50%";

// Crash events

pub const CRASH_EVENT_SOURCE: &str = "eirini-controller";
pub const CRASH_EVENT_TYPE: &str = "Warning";
pub const CRASH_EVENT_ACTION: &str = "crashing";
pub const CRASH_EVENT_REPORTING_INSTANCE: &str = "controller-id";
pub const CRASH_EVENT_FIELD_PATH: &str = "spec.containers{opi}";

/// Reason of the kubelet event emitted when a container is deliberately stopped
pub const KILLING_EVENT_REASON: &str = "Killing";

pub const LRP_KIND: &str = "LRP";
pub const STATEFULSET_KIND: &str = "StatefulSet";
