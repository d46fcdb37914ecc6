//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_optional, env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_TASK_TTL_SECS,
    DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long a finished task's Job is kept before it is deleted (seconds)
    pub task_ttl_secs: u64,
    /// Restrict all watches to this namespace; `None` watches the whole cluster
    pub workloads_namespace: Option<String>,
    /// Minimum backoff after a failed reconciliation (seconds)
    pub backoff_min_secs: u64,
    /// Maximum backoff after a failed reconciliation (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Global log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            task_ttl_secs: DEFAULT_TASK_TTL_SECS,
            workloads_namespace: None,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            task_ttl_secs: env_var_or_default("TASK_TTL_SECONDS", DEFAULT_TASK_TTL_SECS),
            workloads_namespace: env_var_optional("WORKLOADS_NAMESPACE"),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "info"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Get task TTL duration
    #[must_use]
    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}
