//! # Pod Disruption Budgets
//!
//! LRPs with more than one instance keep half of them available during
//! voluntary disruptions. A budget on a single instance would block every
//! eviction, so smaller LRPs have none.

use super::convert::statefulset_label_selector;
use crate::constants::{PDB_INSTANCE_THRESHOLD, PDB_MIN_AVAILABLE};
use crate::crd::Lrp;
use crate::store::{KubeStore, ListSelector};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait PdbUpdater: Send + Sync {
    /// Create or delete the budget of `stset` depending on the LRP's instance count
    async fn update(&self, stset: &StatefulSet, lrp: &Lrp) -> Result<()>;
}

pub struct PodDisruptionBudgetUpdater<S> {
    store: Arc<S>,
}

impl<S> PodDisruptionBudgetUpdater<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> std::fmt::Debug for PodDisruptionBudgetUpdater<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodDisruptionBudgetUpdater").finish_non_exhaustive()
    }
}

/// Budget for `stset`, owned by it and selecting the same pods
pub fn pod_disruption_budget(stset: &StatefulSet, lrp: &Lrp) -> Result<PodDisruptionBudget> {
    let owner = stset
        .controller_owner_ref(&())
        .ok_or_else(|| anyhow!("statefulset {} has no uid yet", stset.name_any()))?;
    let selector = statefulset_label_selector(&lrp.spec);

    Ok(PodDisruptionBudget {
        metadata: ObjectMeta {
            name: Some(stset.name_any()),
            namespace: stset.namespace(),
            labels: Some(selector.clone()),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        spec: Some(PodDisruptionBudgetSpec {
            min_available: Some(IntOrString::String(PDB_MIN_AVAILABLE.to_string())),
            selector: Some(LabelSelector {
                match_labels: Some(selector),
                ..LabelSelector::default()
            }),
            ..PodDisruptionBudgetSpec::default()
        }),
        ..PodDisruptionBudget::default()
    })
}

#[async_trait]
impl<S: KubeStore> PdbUpdater for PodDisruptionBudgetUpdater<S> {
    async fn update(&self, stset: &StatefulSet, lrp: &Lrp) -> Result<()> {
        let namespace = stset.namespace().unwrap_or_default();
        let name = stset.name_any();

        if lrp.spec.instances > PDB_INSTANCE_THRESHOLD {
            let pdb = pod_disruption_budget(stset, lrp)?;
            return match self.store.create(&namespace, &pdb).await {
                Ok(_) => {
                    debug!(statefulset = %name, namespace = %namespace, "Created pod disruption budget");
                    Ok(())
                }
                Err(err) if err.is_already_exists() => Ok(()),
                Err(err) => Err(err).context("failed to create pod disruption budget"),
            };
        }

        let selector = ListSelector::new().field("metadata.name", name.as_str());
        match self
            .store
            .delete_collection::<PodDisruptionBudget>(&namespace, &selector)
            .await
        {
            Err(err) if !err.is_not_found() => {
                Err(err).context("failed to delete pod disruption budget")
            }
            _ => Ok(()),
        }
    }
}
