//! # Configuration
//!
//! Runtime configuration loaded from environment variables.
//!
//! - `controller.rs` - reconciler behaviour (TTLs, backoff, watched namespace, logging)
//! - `workload.rs` - knobs consumed by the StatefulSet and Job converters
//! - `server.rs` - metrics and webhook server settings

mod controller;
mod server;
mod workload;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
pub use workload::WorkloadConfig;

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| parse_bool(&v))
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an optional environment variable, treating empty values as unset
pub(crate) fn env_var_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}
