//! # Workload Configuration
//!
//! Settings applied to every StatefulSet and Job produced by the converters.

use super::{env_var_or_default_bool, env_var_or_default_str};
use crate::constants::{DEFAULT_APPLICATION_SERVICE_ACCOUNT, DEFAULT_REGISTRY_SECRET_NAME};

#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Service account the application pods run as
    pub application_service_account: String,
    /// Image pull secret always attached to workload pods
    pub registry_secret_name: String,
    /// Keep the service account token mounted in application pods
    pub allow_automount_service_account_token: bool,
    /// Allow LRP images to run as root
    pub allow_run_image_as_root: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            application_service_account: DEFAULT_APPLICATION_SERVICE_ACCOUNT.to_string(),
            registry_secret_name: DEFAULT_REGISTRY_SECRET_NAME.to_string(),
            allow_automount_service_account_token: false,
            allow_run_image_as_root: false,
        }
    }
}

impl WorkloadConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            application_service_account: env_var_or_default_str(
                "APPLICATION_SERVICE_ACCOUNT",
                DEFAULT_APPLICATION_SERVICE_ACCOUNT,
            ),
            registry_secret_name: env_var_or_default_str(
                "REGISTRY_SECRET_NAME",
                DEFAULT_REGISTRY_SECRET_NAME,
            ),
            allow_automount_service_account_token: env_var_or_default_bool(
                "ALLOW_AUTOMOUNT_SERVICE_ACCOUNT_TOKEN",
                false,
            ),
            allow_run_image_as_root: env_var_or_default_bool("ALLOW_RUN_IMAGE_AS_ROOT", false),
        }
    }
}
