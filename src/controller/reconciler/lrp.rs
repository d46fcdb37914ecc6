//! # LRP Reconciler
//!
//! Drives an LRP towards its StatefulSet: desires the StatefulSet when it is
//! missing, otherwise mirrors its ready replicas into the LRP status and
//! applies image and instance changes.

use super::types::ReconcilerError;
use crate::crd::Lrp;
use crate::errors::ErrorList;
use crate::store::KubeStore;
use crate::workload::naming::statefulset_name;
use crate::workload::stset::{LrpDesirer, LrpUpdater};
use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

pub struct LrpReconciler<S> {
    store: Arc<S>,
    desirer: Arc<dyn LrpDesirer>,
    updater: Arc<dyn LrpUpdater>,
}

impl<S> LrpReconciler<S> {
    pub fn new(store: Arc<S>, desirer: Arc<dyn LrpDesirer>, updater: Arc<dyn LrpUpdater>) -> Self {
        Self {
            store,
            desirer,
            updater,
        }
    }
}

impl<S> std::fmt::Debug for LrpReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrpReconciler").finish_non_exhaustive()
    }
}

impl<S: KubeStore> LrpReconciler<S> {
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        let span = info_span!(
            "controller.lrp.reconcile",
            resource.namespace = namespace,
            resource.name = name
        );

        async move {
            let lrp = match self.store.get::<Lrp>(namespace, name).await {
                Ok(lrp) => lrp,
                Err(err) if err.is_not_found() => {
                    debug!("LRP not found, nothing to reconcile");
                    return Ok(Action::await_change());
                }
                Err(err) => return Err(anyhow::Error::new(err).context("failed to get lrp").into()),
            };

            self.reconcile_lrp(&lrp).await?;
            Ok(Action::await_change())
        }
        .instrument(span)
        .await
    }

    async fn reconcile_lrp(&self, lrp: &Lrp) -> Result<()> {
        let namespace = lrp.namespace().unwrap_or_default();
        let stset_name = statefulset_name(&lrp.spec);

        let stset = match self.store.get::<StatefulSet>(&namespace, &stset_name).await {
            Ok(stset) => stset,
            Err(err) if err.is_not_found() => {
                info!(statefulset = %stset_name, "StatefulSet not found, desiring LRP");
                return self
                    .desirer
                    .desire(lrp)
                    .await
                    .context("failed to desire lrp");
            }
            Err(err) => return Err(anyhow::Error::new(err).context("failed to get statefulSet")),
        };

        let mut errors = ErrorList::new();

        if let Err(err) = self.update_status(lrp, &stset).await {
            errors.push(err.context("failed to update lrp status"));
        }

        if let Err(err) = self.updater.update(lrp, &stset).await {
            errors.push(err.context("failed to update app"));
        }

        errors.into_result()
    }

    async fn update_status(&self, lrp: &Lrp, stset: &StatefulSet) -> Result<()> {
        let ready_replicas = stset
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or_default();
        let patch = json!({
            "status": {
                "replicas": ready_replicas
            }
        });

        self.store
            .patch_status::<Lrp>(
                lrp.namespace().as_deref().unwrap_or_default(),
                &lrp.name_any(),
                &patch,
            )
            .await?;
        Ok(())
    }
}
