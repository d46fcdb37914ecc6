//! # Pod Crash Reconciler
//!
//! Turns crashes of LRP instances into Kubernetes Events on the owning LRP.
//!
//! Repeated crashes of the same instance for the same reason update a single
//! Event (count and last timestamp). The crash timestamp is recorded on the
//! pod so the same crash is not reported twice.

use super::types::ReconcilerError;
use crate::constants::{
    ANNOTATION_LAST_REPORTED_LRP_CRASH, ANNOTATION_PROCESS_GUID, CRASH_EVENT_ACTION,
    CRASH_EVENT_FIELD_PATH, CRASH_EVENT_REPORTING_INSTANCE, CRASH_EVENT_SOURCE, CRASH_EVENT_TYPE,
    LABEL_INSTANCE_INDEX, LRP_KIND, STATEFULSET_KIND,
};
use crate::event::{CrashEvent, CrashEventGenerator};
use crate::observability::metrics;
use crate::store::{KubeStore, ListSelector};
use crate::time::{from_unix_seconds, from_utc};
use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

pub struct PodCrashReconciler<S> {
    store: Arc<S>,
    generator: Arc<dyn CrashEventGenerator>,
}

impl<S> PodCrashReconciler<S> {
    pub fn new(store: Arc<S>, generator: Arc<dyn CrashEventGenerator>) -> Self {
        Self { store, generator }
    }
}

impl<S> std::fmt::Debug for PodCrashReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodCrashReconciler").finish_non_exhaustive()
    }
}

impl<S: KubeStore> PodCrashReconciler<S> {
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        let span = info_span!(
            "controller.pod_crash.reconcile",
            resource.namespace = namespace,
            resource.name = name
        );

        async move {
            let pod = match self.store.get::<Pod>(namespace, name).await {
                Ok(pod) => pod,
                Err(err) if err.is_not_found() => {
                    debug!("Pod not found, nothing to reconcile");
                    return Ok(Action::await_change());
                }
                Err(err) => return Err(anyhow::Error::new(err).context("failed to get pod").into()),
            };

            self.reconcile_pod(namespace, &pod).await?;
            Ok(Action::await_change())
        }
        .instrument(span)
        .await
    }

    async fn reconcile_pod(&self, namespace: &str, pod: &Pod) -> Result<()> {
        let Some(crash) = self.generator.generate(pod).await else {
            return Ok(());
        };

        let timestamp = crash.crash_timestamp.to_string();
        if pod.annotations().get(ANNOTATION_LAST_REPORTED_LRP_CRASH) == Some(&timestamp) {
            debug!(crash_timestamp = crash.crash_timestamp, "Crash already reported");
            return Ok(());
        }

        let Some(stset_ref) = owner_reference(pod.owner_references(), STATEFULSET_KIND) else {
            debug!("Pod is not owned by a StatefulSet, ignoring crash");
            return Ok(());
        };

        let stset = self
            .store
            .get::<StatefulSet>(namespace, &stset_ref.name)
            .await
            .context("failed to get stateful set")?;

        let Some(lrp_ref) = owner_reference(stset.owner_references(), LRP_KIND) else {
            debug!(statefulset = %stset_ref.name, "StatefulSet is not owned by an LRP, ignoring crash");
            return Ok(());
        };

        self.report_crash(namespace, &crash, lrp_ref).await?;
        self.mark_reported(namespace, pod, &timestamp).await;
        Ok(())
    }

    async fn report_crash(&self, namespace: &str, crash: &CrashEvent, lrp_ref: &OwnerReference) -> Result<()> {
        let existing = self
            .existing_event(namespace, crash, lrp_ref)
            .await
            .context("failed to get existing event")?;

        match existing {
            Some(event) => self.update_event(namespace, event, crash).await,
            None => self.create_event(namespace, crash, lrp_ref).await,
        }
    }

    /// The event already reporting crashes of this instance for the same reason
    async fn existing_event(
        &self,
        namespace: &str,
        crash: &CrashEvent,
        lrp_ref: &OwnerReference,
    ) -> Result<Option<Event>> {
        let selector = ListSelector::new()
            .label(LABEL_INSTANCE_INDEX, crash.index.to_string())
            .field("involvedObject.name", lrp_ref.name.clone())
            .field("involvedObject.kind", lrp_ref.kind.clone())
            .field("reason", event_reason(crash));

        let mut events = self
            .store
            .list::<Event>(namespace, &selector)
            .await
            .context("failed to list events")?;

        if events.len() == 1 {
            Ok(events.pop())
        } else {
            Ok(None)
        }
    }

    async fn update_event(&self, namespace: &str, mut event: Event, crash: &CrashEvent) -> Result<()> {
        event.count = Some(event.count.unwrap_or_default() + 1);
        event.last_timestamp = Some(from_unix_seconds(crash.crash_timestamp)?);

        self.store
            .replace(namespace, &event.name_any(), &event)
            .await
            .context("failed to update event")?;

        info!(
            event = %event.name_any(),
            count = event.count.unwrap_or_default(),
            "Updated crash event"
        );
        metrics::increment_crash_events("updated");
        Ok(())
    }

    async fn create_event(&self, namespace: &str, crash: &CrashEvent, lrp_ref: &OwnerReference) -> Result<()> {
        let event = crash_event(namespace, crash, lrp_ref)?;

        let created = self
            .store
            .create(namespace, &event)
            .await
            .context("failed to create event")?;

        info!(event = %created.name_any(), reason = %crash.reason, "Created crash event");
        metrics::increment_crash_events("created");
        Ok(())
    }

    async fn mark_reported(&self, namespace: &str, pod: &Pod, timestamp: &str) {
        let patch = json!({
            "metadata": {
                "annotations": {
                    ANNOTATION_LAST_REPORTED_LRP_CRASH: timestamp
                }
            }
        });

        if let Err(err) = self.store.patch::<Pod>(namespace, &pod.name_any(), &patch).await {
            error!(error = %err, "Failed to set last crash time on pod");
        }
    }
}

fn owner_reference<'a>(refs: &'a [OwnerReference], kind: &str) -> Option<&'a OwnerReference> {
    refs.iter().find(|r| r.kind == kind)
}

fn event_reason(crash: &CrashEvent) -> String {
    format!("Container: {}", crash.reason)
}

/// A new Warning event on the LRP for a first crash of an instance
fn crash_event(namespace: &str, crash: &CrashEvent, lrp_ref: &OwnerReference) -> Result<Event> {
    let crash_time: Time = from_unix_seconds(crash.crash_timestamp)?;

    Ok(Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", crash.instance)),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                LABEL_INSTANCE_INDEX.to_string(),
                crash.index.to_string(),
            )])),
            annotations: Some(BTreeMap::from([(
                ANNOTATION_PROCESS_GUID.to_string(),
                crash.process_guid.clone(),
            )])),
            ..ObjectMeta::default()
        },
        involved_object: ObjectReference {
            kind: Some(lrp_ref.kind.clone()),
            name: Some(lrp_ref.name.clone()),
            uid: Some(lrp_ref.uid.clone()),
            api_version: Some(lrp_ref.api_version.clone()),
            namespace: Some(namespace.to_string()),
            field_path: Some(CRASH_EVENT_FIELD_PATH.to_string()),
            ..ObjectReference::default()
        },
        reason: Some(event_reason(crash)),
        message: Some(format!(
            "Container terminated with exit code: {}",
            crash.exit_code
        )),
        source: Some(EventSource {
            component: Some(CRASH_EVENT_SOURCE.to_string()),
            ..EventSource::default()
        }),
        first_timestamp: Some(crash_time.clone()),
        last_timestamp: Some(crash_time),
        event_time: Some(from_utc(Utc::now())?),
        count: Some(1),
        type_: Some(CRASH_EVENT_TYPE.to_string()),
        reporting_component: Some(CRASH_EVENT_SOURCE.to_string()),
        action: Some(CRASH_EVENT_ACTION.to_string()),
        reporting_instance: Some(CRASH_EVENT_REPORTING_INSTANCE.to_string()),
        ..Event::default()
    })
}
