//! In-place update of an existing StatefulSet.
//!
//! Only `instances` and `image` may change on an LRP version, so only the
//! replica count and the application container image are ever patched.

use super::pdb::PdbUpdater;
use crate::constants::APPLICATION_CONTAINER_NAME;
use crate::crd::Lrp;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

#[async_trait]
pub trait LrpUpdater: Send + Sync {
    async fn update(&self, lrp: &Lrp, stset: &StatefulSet) -> Result<()>;
}

pub struct StatefulSetUpdater<S> {
    store: Arc<S>,
    pdb_updater: Arc<dyn PdbUpdater>,
}

impl<S> StatefulSetUpdater<S> {
    pub fn new(store: Arc<S>, pdb_updater: Arc<dyn PdbUpdater>) -> Self {
        Self { store, pdb_updater }
    }
}

impl<S> std::fmt::Debug for StatefulSetUpdater<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatefulSetUpdater").finish_non_exhaustive()
    }
}

/// Merge patch bringing `stset` in line with `lrp`, `None` when nothing differs
///
/// Containers are sent as a whole list since merge patches replace arrays.
#[must_use]
pub fn statefulset_patch(lrp: &Lrp, stset: &StatefulSet) -> Option<Value> {
    let Some(current) = stset.spec.as_ref() else {
        return Some(json!({ "spec": { "replicas": lrp.spec.instances } }));
    };
    let mut spec_patch = Map::new();

    if current.replicas != Some(lrp.spec.instances) {
        spec_patch.insert("replicas".to_string(), json!(lrp.spec.instances));
    }

    if !lrp.spec.image.is_empty() {
        if let Some(pod_spec) = current.template.spec.as_ref() {
            let mut containers = pod_spec.containers.clone();
            let mut image_changed = false;
            for container in containers
                .iter_mut()
                .filter(|c| c.name == APPLICATION_CONTAINER_NAME)
            {
                if container.image.as_deref() != Some(lrp.spec.image.as_str()) {
                    container.image = Some(lrp.spec.image.clone());
                    image_changed = true;
                }
            }
            if image_changed {
                spec_patch.insert(
                    "template".to_string(),
                    json!({ "spec": { "containers": containers } }),
                );
            }
        }
    }

    if spec_patch.is_empty() {
        None
    } else {
        Some(json!({ "spec": spec_patch }))
    }
}

#[async_trait]
impl<S: KubeStore> LrpUpdater for StatefulSetUpdater<S> {
    async fn update(&self, lrp: &Lrp, stset: &StatefulSet) -> Result<()> {
        let span = info_span!(
            "statefulset.update",
            guid = %lrp.spec.guid,
            version = %lrp.spec.version,
            statefulset = %stset.name_any()
        );

        async move {
            let Some(patch) = statefulset_patch(lrp, stset) else {
                debug!("StatefulSet already up to date");
                return Ok(());
            };

            let namespace = stset.namespace().unwrap_or_default();
            let updated: StatefulSet = self
                .store
                .patch(&namespace, &stset.name_any(), &patch)
                .await
                .context("failed to patch statefulset")?;
            debug!(replicas = lrp.spec.instances, "Patched StatefulSet");

            self.pdb_updater
                .update(&updated, lrp)
                .await
                .context("failed to update pod disruption budget")
        }
        .instrument(span)
        .await
    }
}
