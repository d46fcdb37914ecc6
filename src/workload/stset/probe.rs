//! Liveness and readiness probes derived from an LRP health check.

use crate::crd::{Healthcheck, LrpSpec};
use k8s_openapi::api::core::v1::{HTTPGetAction, Probe, TCPSocketAction};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Builds one probe kind for an LRP; `None` leaves the probe off
pub type ProbeCreator = fn(&LrpSpec) -> Option<Probe>;

const LIVENESS_FAILURE_THRESHOLD: i32 = 4;
const READINESS_FAILURE_THRESHOLD: i32 = 1;

/// HTTP or TCP liveness probe, delayed by the health check timeout
#[must_use]
pub fn create_liveness_probe(spec: &LrpSpec) -> Option<Probe> {
    let mut probe = base_probe(&spec.health)?;
    probe.initial_delay_seconds = Some(to_seconds(spec.health.timeout_ms));
    probe.failure_threshold = Some(LIVENESS_FAILURE_THRESHOLD);
    Some(probe)
}

/// HTTP or TCP readiness probe that fails on the first miss
#[must_use]
pub fn create_readiness_probe(spec: &LrpSpec) -> Option<Probe> {
    let mut probe = base_probe(&spec.health)?;
    probe.failure_threshold = Some(READINESS_FAILURE_THRESHOLD);
    Some(probe)
}

fn base_probe(health: &Healthcheck) -> Option<Probe> {
    match health.type_.as_str() {
        "http" => Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some(health.endpoint.clone()),
                port: IntOrString::Int(health.port),
                ..HTTPGetAction::default()
            }),
            ..Probe::default()
        }),
        "port" => Some(Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(health.port),
                ..TCPSocketAction::default()
            }),
            ..Probe::default()
        }),
        _ => None,
    }
}

fn to_seconds(millis: u32) -> i32 {
    i32::try_from(millis / 1000).unwrap_or(i32::MAX)
}
