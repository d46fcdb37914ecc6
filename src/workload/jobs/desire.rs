//! # Job Desirer
//!
//! Creates the Job of a task, together with its private registry secret.
//! A Job that already exists counts as desired.

use super::convert::TaskToJobConverter;
use crate::crd::Task;
use crate::store::KubeStore;
use crate::workload::registry::{
    cleanup_and_error, create_registry_secret_if_required, set_secret_owner,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

#[async_trait]
pub trait TaskDesirer: Send + Sync {
    async fn desire(&self, task: &Task) -> Result<()>;
}

/// Creates the Job of a task, plus its private registry secret when needed
pub struct JobDesirer<S> {
    store: Arc<S>,
    converter: Arc<dyn TaskToJobConverter>,
}

impl<S> JobDesirer<S> {
    pub fn new(store: Arc<S>, converter: Arc<dyn TaskToJobConverter>) -> Self {
        Self { store, converter }
    }
}

impl<S> std::fmt::Debug for JobDesirer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDesirer").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: KubeStore> TaskDesirer for JobDesirer<S> {
    async fn desire(&self, task: &Task) -> Result<()> {
        let namespace = task.namespace().unwrap_or_default();
        let span = info_span!("job.desire", guid = %task.spec.guid, namespace = %namespace);

        async move {
            let private_registry_secret = create_registry_secret_if_required(
                self.store.as_ref(),
                &namespace,
                &task.spec.image,
                task.spec.private_registry.as_ref(),
                "job",
            )
            .await?;

            let mut job = self.converter.convert(task, private_registry_secret.as_ref());
            job.metadata.namespace = Some(namespace.clone());
            let owner = task
                .controller_owner_ref(&())
                .ok_or_else(|| anyhow!("task {} has no uid", task.name_any()))
                .context("failed to set controller reference")?;
            job.metadata.owner_references = Some(vec![owner]);

            let created = match self.store.create(&namespace, &job).await {
                Ok(created) => created,
                Err(err) if err.is_already_exists() => {
                    debug!(job = %job.name_any(), error = %err, "Job already exists");
                    return Ok(());
                }
                Err(err) => {
                    let err = anyhow::Error::new(err).context("failed to create job");
                    return Err(cleanup_and_error(
                        self.store.as_ref(),
                        err,
                        private_registry_secret.as_ref(),
                    )
                    .await);
                }
            };
            info!(job = %created.name_any(), "Created Job");

            set_secret_owner(self.store.as_ref(), private_registry_secret.as_ref(), &created)
                .await
                .context("failed to set owner to the registry secret")
        }
        .instrument(span)
        .await
    }
}
