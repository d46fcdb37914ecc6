//! # Task Reconciler
//!
//! Runs each Task as a Job, mirrors the Job status into the Task and deletes
//! the Job once a completed Task outlived its TTL.

use super::types::ReconcilerError;
use crate::crd::{Task, TaskStatus};
use crate::store::{KubeStore, ListSelector};
use crate::time::parse_rfc3339;
use crate::workload::jobs::{job_status, TaskDesirer};
use crate::workload::naming::job_name;
use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

pub struct TaskReconciler<S> {
    store: Arc<S>,
    desirer: Arc<dyn TaskDesirer>,
    ttl: Duration,
}

impl<S> TaskReconciler<S> {
    /// `ttl` is how long the Job of a completed task is kept
    pub fn new(store: Arc<S>, desirer: Arc<dyn TaskDesirer>, ttl: Duration) -> Self {
        Self {
            store,
            desirer,
            ttl,
        }
    }
}

impl<S> std::fmt::Debug for TaskReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskReconciler")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<S: KubeStore> TaskReconciler<S> {
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        let span = info_span!(
            "controller.task.reconcile",
            resource.namespace = namespace,
            resource.name = name
        );

        async move {
            let task = match self.store.get::<Task>(namespace, name).await {
                Ok(task) => task,
                Err(err) if err.is_not_found() => {
                    debug!("Task not found, nothing to reconcile");
                    return Ok(Action::await_change());
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context("failed to get task").into())
                }
            };

            Ok(self.reconcile_task(&task).await?)
        }
        .instrument(span)
        .await
    }

    async fn reconcile_task(&self, task: &Task) -> Result<Action> {
        let namespace = task.namespace().unwrap_or_default();

        if let Some(status) = task.status.as_ref().filter(|s| s.is_completed()) {
            return self.handle_completed(task, &namespace, status).await;
        }

        let job = match self.store.get::<Job>(&namespace, &job_name(&task.spec)).await {
            Ok(job) => job,
            Err(err) if err.is_not_found() => {
                info!("Job not found, desiring task");
                self.desirer
                    .desire(task)
                    .await
                    .context("failed to desire task")?;
                return Ok(Action::await_change());
            }
            Err(err) => return Err(anyhow::Error::new(err).context("failed to get job")),
        };

        let status = job_status(&job);
        let patch = json!({ "status": status });
        self.store
            .patch_status::<Task>(&namespace, &task.name_any(), &patch)
            .await
            .context("failed to update task status")?;

        if status.is_completed() {
            debug!(execution_status = ?status.execution_status, "Task completed, requeueing after TTL");
            crate::observability::metrics::increment_requeues_total("task-ttl");
            return Ok(Action::requeue(self.ttl));
        }

        Ok(Action::await_change())
    }

    async fn handle_completed(&self, task: &Task, namespace: &str, status: &TaskStatus) -> Result<Action> {
        let remaining = self.remaining_ttl(status);
        if !remaining.is_zero() {
            debug!(remaining_secs = remaining.as_secs(), "Task completed, keeping its job until the TTL expires");
            return Ok(Action::requeue(remaining));
        }

        let name = job_name(&task.spec);
        info!(job = %name, "Task TTL expired, deleting its job");
        let selector = ListSelector::new().field("metadata.name", name);
        self.store
            .delete_collection::<Job>(namespace, &selector)
            .await
            .context("failed to delete job")?;

        Ok(Action::await_change())
    }

    /// Time left before the job of a completed task expires; zero once expired
    fn remaining_ttl(&self, status: &TaskStatus) -> Duration {
        let Some(end_time) = status.end_time.as_deref().and_then(parse_rfc3339) else {
            return Duration::ZERO;
        };
        let elapsed = (Utc::now() - end_time).to_std().unwrap_or_default();
        self.ttl.saturating_sub(elapsed)
    }
}
