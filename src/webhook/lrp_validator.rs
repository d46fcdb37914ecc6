//! # LRP Validator
//!
//! Validating webhook rejecting LRP updates that change anything in `spec`
//! other than `image` and `instances`. Changing other fields requires a new
//! LRP version, which the API layer creates as a new object.

use super::{bad_request, decode};
use crate::crd::{Lrp, LrpSpec};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::core::DynamicObject;
use serde_json::Value;
use std::collections::BTreeSet;

/// Spec fields that may change in place
const MUTABLE_FIELDS: [&str; 2] = ["image", "instances"];

pub fn validate_lrp_update(req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let res = AdmissionResponse::from(req);
    if req.operation != Operation::Update {
        return res;
    }

    let old: Lrp = match decode(req.old_object.as_ref()) {
        Ok(lrp) => lrp,
        Err(err) => return bad_request(res, format!("failed to decode old lrp: {err}")),
    };
    let new: Lrp = match decode(req.object.as_ref()) {
        Ok(lrp) => lrp,
        Err(err) => return bad_request(res, format!("failed to decode lrp: {err}")),
    };

    let changed = match immutable_field_changes(&old.spec, &new.spec) {
        Ok(changed) => changed,
        Err(err) => return bad_request(res, format!("failed to compare lrps: {err}")),
    };

    if changed.is_empty() {
        return res;
    }

    bad_request(
        res,
        format!(
            "Changing immutable fields not allowed: {}",
            changed.join(", ")
        ),
    )
}

/// Dotted paths of changed immutable fields, rooted at `spec`, sorted and distinct
///
/// List indices are not part of the paths.
pub fn immutable_field_changes(old: &LrpSpec, new: &LrpSpec) -> Result<Vec<String>, serde_json::Error> {
    let mut old = serde_json::to_value(old)?;
    let mut new = serde_json::to_value(new)?;
    for value in [&mut old, &mut new] {
        if let Value::Object(fields) = value {
            for field in MUTABLE_FIELDS {
                fields.remove(field);
            }
        }
    }

    let mut paths = BTreeSet::new();
    diff_paths("spec", &old, &new, &mut paths);
    Ok(paths.into_iter().collect())
}

fn diff_paths(path: &str, old: &Value, new: &Value, paths: &mut BTreeSet<String>) {
    match (old, new) {
        (Value::Object(old_fields), Value::Object(new_fields)) => {
            let keys: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();
            for key in keys {
                let child = format!("{path}.{key}");
                match (old_fields.get(key), new_fields.get(key)) {
                    (Some(o), Some(n)) => diff_paths(&child, o, n, paths),
                    _ => {
                        paths.insert(child);
                    }
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) if old_items.len() == new_items.len() => {
            for (o, n) in old_items.iter().zip(new_items) {
                diff_paths(path, o, n, paths);
            }
        }
        _ => {
            if old != new {
                paths.insert(path.to_string());
            }
        }
    }
}
