//! # Instance Index Injector
//!
//! Mutating webhook for LRP pods: adds `CF_INSTANCE_INDEX` to the application
//! container, taken from the StatefulSet ordinal at the end of the pod name.
//! Only pod creation is mutated.

use super::{bad_request, decode};
use crate::constants::{APPLICATION_CONTAINER_NAME, ENV_CF_INSTANCE_INDEX};
use crate::workload::naming::parse_app_index;
use k8s_openapi::api::core::v1::Pod;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::core::DynamicObject;
use kube::ResourceExt;
use serde_json::json;
use tracing::debug;

pub fn inject_instance_index(req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let res = AdmissionResponse::from(req);
    if req.operation != Operation::Create {
        return res;
    }

    let pod: Pod = match decode(req.object.as_ref()) {
        Ok(pod) => pod,
        Err(err) => return bad_request(res, format!("failed to decode pod: {err}")),
    };

    let pod_name = pod.name_any();
    let index = match parse_app_index(&pod_name) {
        Ok(index) => index,
        Err(err) => return bad_request(res, err),
    };

    let patch = match instance_index_patch(&pod, index) {
        Some(patch) => patch,
        None => return bad_request(res, "no application container found in pod"),
    };

    debug!(pod = %pod_name, index, "Injecting instance index");
    match serde_json::from_value::<json_patch::Patch>(patch) {
        Ok(patch) => match res.clone().with_patch(patch) {
            Ok(res) => res,
            Err(err) => bad_request(res, format!("failed to serialize patch: {err}")),
        },
        Err(err) => bad_request(res, format!("failed to build patch: {err}")),
    }
}

/// JSON patch adding the index to the application container, `None` without one
fn instance_index_patch(pod: &Pod, index: u32) -> Option<serde_json::Value> {
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();
    let position = containers
        .iter()
        .position(|c| c.name == APPLICATION_CONTAINER_NAME)?;

    let env_var = json!({
        "name": ENV_CF_INSTANCE_INDEX,
        "value": index.to_string(),
    });

    let has_env = containers[position]
        .env
        .as_ref()
        .is_some_and(|env| !env.is_empty());
    let operation = if has_env {
        json!({
            "op": "add",
            "path": format!("/spec/containers/{position}/env/-"),
            "value": env_var,
        })
    } else {
        json!({
            "op": "add",
            "path": format!("/spec/containers/{position}/env"),
            "value": [env_var],
        })
    };

    Some(json!([operation]))
}
