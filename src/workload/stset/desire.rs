//! # StatefulSet Desirer
//!
//! Creates the StatefulSet of a new LRP version, together with its private
//! registry secret and pod disruption budget.

use super::convert::LrpToStatefulSetConverter;
use super::pdb::PdbUpdater;
use crate::crd::Lrp;
use crate::store::KubeStore;
use crate::workload::naming::statefulset_name;
use crate::workload::registry::{
    cleanup_and_error, create_registry_secret_if_required, set_secret_owner,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

#[async_trait]
pub trait LrpDesirer: Send + Sync {
    async fn desire(&self, lrp: &Lrp) -> Result<()>;
}

pub struct StatefulSetDesirer<S> {
    store: Arc<S>,
    converter: Arc<dyn LrpToStatefulSetConverter>,
    pdb_updater: Arc<dyn PdbUpdater>,
}

impl<S> StatefulSetDesirer<S> {
    pub fn new(
        store: Arc<S>,
        converter: Arc<dyn LrpToStatefulSetConverter>,
        pdb_updater: Arc<dyn PdbUpdater>,
    ) -> Self {
        Self {
            store,
            converter,
            pdb_updater,
        }
    }
}

impl<S> std::fmt::Debug for StatefulSetDesirer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatefulSetDesirer").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: KubeStore> LrpDesirer for StatefulSetDesirer<S> {
    async fn desire(&self, lrp: &Lrp) -> Result<()> {
        let namespace = lrp.namespace().unwrap_or_default();
        let span = info_span!(
            "statefulset.desire",
            guid = %lrp.spec.guid,
            version = %lrp.spec.version,
            namespace = %namespace
        );

        async move {
            let name = statefulset_name(&lrp.spec);

            let private_registry_secret = create_registry_secret_if_required(
                self.store.as_ref(),
                &namespace,
                &lrp.spec.image,
                lrp.spec.private_registry.as_ref(),
                "statefulset",
            )
            .await?;

            let mut stset = self
                .converter
                .convert(&name, lrp, private_registry_secret.as_ref())?;
            stset.metadata.namespace = Some(namespace.clone());
            let owner = lrp
                .controller_owner_ref(&())
                .ok_or_else(|| anyhow!("lrp {} has no uid", lrp.name_any()))
                .context("failed to set controller reference")?;
            stset.metadata.owner_references = Some(vec![owner]);

            let created = match self.store.create(&namespace, &stset).await {
                Ok(created) => created,
                Err(err) if err.is_already_exists() => {
                    debug!(statefulset = %name, error = %err, "StatefulSet already exists");
                    return Ok(());
                }
                Err(err) => {
                    let err = anyhow::Error::new(err).context("failed to create statefulset");
                    return Err(cleanup_and_error(
                        self.store.as_ref(),
                        err,
                        private_registry_secret.as_ref(),
                    )
                    .await);
                }
            };
            info!(statefulset = %name, "Created StatefulSet");

            if let Err(err) =
                set_secret_owner(self.store.as_ref(), private_registry_secret.as_ref(), &created).await
            {
                error!(error = %format!("{err:#}"), "Failed to set owner of the registry secret");
                return Err(err.context("failed to set owner to the registry secret"));
            }

            if let Err(err) = self.pdb_updater.update(&created, lrp).await {
                error!(error = %format!("{err:#}"), "Failed to create pod disruption budget");
                return Err(err.context("failed to create pod disruption budget"));
            }

            Ok(())
        }
        .instrument(span)
        .await
    }
}
