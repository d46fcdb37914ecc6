//! Docker config payloads for private registry image pull secrets.

use crate::constants::DOCKER_HUB_HOST;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct DockerConfig {
    auths: BTreeMap<String, DockerAuth>,
}

#[derive(Serialize)]
struct DockerAuth {
    username: String,
    password: String,
    auth: String,
}

impl std::fmt::Debug for DockerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// `.dockerconfigjson` content granting pull access to `host`
pub fn docker_config_json(
    host: &str,
    username: &str,
    password: &str,
) -> Result<String, serde_json::Error> {
    let auth = DockerAuth {
        username: username.to_string(),
        password: password.to_string(),
        auth: STANDARD.encode(format!("{username}:{password}")),
    };
    let config = DockerConfig {
        auths: BTreeMap::from([(host.to_string(), auth)]),
    };
    serde_json::to_string(&config)
}

/// Registry host an image reference is pulled from
///
/// The first path component names a registry only when it looks like a host
/// (`localhost`, or contains a `.` or `:`). Everything else comes from Docker Hub.
#[must_use]
pub fn registry_host(image: &str) -> String {
    match image.split_once('/') {
        Some((first, _)) if first == "localhost" || first.contains('.') || first.contains(':') => {
            first.to_string()
        }
        _ => DOCKER_HUB_HOST.to_string(),
    }
}
