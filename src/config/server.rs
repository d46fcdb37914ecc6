//! # Server Configuration
//!
//! Ports and TLS material for the metrics and admission webhook servers.

use super::{env_var_optional, env_var_or_default};
use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
    DEFAULT_WEBHOOK_PORT,
};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Port for the admission webhooks
    pub webhook_port: u16,
    /// Directory holding `tls.crt` and `tls.key` for the webhook server.
    /// Without it the webhooks are served over plain HTTP.
    pub webhook_cert_dir: Option<PathBuf>,
    /// How long to wait for the metrics server to bind
    pub startup_timeout_secs: u64,
    /// Readiness poll interval while waiting for the server
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            webhook_port: DEFAULT_WEBHOOK_PORT,
            webhook_cert_dir: None,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            webhook_port: env_var_or_default("WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT),
            webhook_cert_dir: env_var_optional("WEBHOOK_CERT_DIR").map(PathBuf::from),
            startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }

    /// Certificate and key paths, when TLS is configured
    #[must_use]
    pub fn webhook_tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        self.webhook_cert_dir
            .as_ref()
            .map(|dir| (dir.join("tls.crt"), dir.join("tls.key")))
    }
}
