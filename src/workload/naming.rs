//! # Naming
//!
//! Deterministic names for generated workload objects.
//!
//! StatefulSet names carry a hash of `guid-version` so every LRP version gets
//! its own StatefulSet even when app and space names collide after truncation.

use crate::crd::{LrpSpec, TaskSpec};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum length of the app/space prefix of generated names
pub const MAX_PREFIX_LENGTH: usize = 40;

/// Hex characters of the `guid-version` hash kept in StatefulSet names
const HASH_SUFFIX_LENGTH: usize = 10;

/// RFC 1123 subdomain: dot separated labels
static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("Failed to compile DNS subdomain regex - this should never happen")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("could not parse app name from {0}")]
    MissingSeparator(String),
    #[error("pod {0} name does not contain an index")]
    MissingIndex(String),
}

/// Lowercase, replace underscores and fall back when the result is not a DNS label
///
/// The (possibly fallen back) value is truncated to `max_length` characters.
#[must_use]
pub fn sanitize_name(name: &str, fallback: &str, max_length: usize) -> String {
    let sanitized = name.to_lowercase().replace('_', "-");
    let chosen = if DNS_SUBDOMAIN.is_match(&sanitized) {
        sanitized.as_str()
    } else {
        fallback
    };
    truncate(chosen, max_length)
}

fn truncate(value: &str, max_length: usize) -> String {
    value.chars().take(max_length).collect()
}

/// Name of the StatefulSet backing an LRP version
#[must_use]
pub fn statefulset_name(spec: &LrpSpec) -> String {
    let prefix = sanitize_name(
        &format!("{}-{}", spec.app_name, spec.space_name),
        &spec.guid,
        MAX_PREFIX_LENGTH,
    );
    format!("{prefix}-{}", version_hash(&spec.guid, &spec.version))
}

/// Name of the Job running a task
#[must_use]
pub fn job_name(spec: &TaskSpec) -> String {
    let prefix = sanitize_name(
        &format!("{}-{}", spec.app_name, spec.space_name),
        &spec.guid,
        MAX_PREFIX_LENGTH,
    );
    if spec.name.is_empty() {
        prefix
    } else {
        format!("{prefix}-{}", spec.name)
    }
}

fn version_hash(guid: &str, version: &str) -> String {
    let digest = Sha256::digest(format!("{guid}-{version}").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..HASH_SUFFIX_LENGTH].to_string()
}

/// Instance index encoded in the trailing `-<N>` of a StatefulSet pod name
pub fn parse_app_index(pod_name: &str) -> Result<u32, NameError> {
    let Some((_, suffix)) = pod_name.rsplit_once('-') else {
        return Err(NameError::MissingSeparator(pod_name.to_string()));
    };
    suffix
        .parse()
        .ok()
        .ok_or_else(|| NameError::MissingIndex(pod_name.to_string()))
}
