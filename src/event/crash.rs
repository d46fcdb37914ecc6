//! # Crash Event Generator
//!
//! Decides whether a pod's application container crashed and describes the crash.
//!
//! A container that is terminated right now is only a crash when the pod was
//! not deliberately stopped, which shows as a `Killing` event being the most
//! recent event of the pod. A container that came back after terminating is
//! reported from its last termination state.
//!
//! The same crash is reported on every pod update until the reconciler records
//! its timestamp on the pod; this module does not de-duplicate.

use crate::constants::{
    ANNOTATION_PROCESS_GUID, ANNOTATION_VERSION, APPLICATION_CONTAINER_NAME, APP_SOURCE_TYPE, KILLING_EVENT_REASON,
    LABEL_SOURCE_TYPE,
};
use crate::store::{KubeStore, ListSelector};
use crate::time::to_utc;
use crate::workload::naming::parse_app_index;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ContainerStateTerminated, ContainerStatus, Event, Pod};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};

/// A crash of an LRP instance's application container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashEvent {
    pub process_guid: String,
    pub reason: String,
    pub instance: String,
    pub index: u32,
    pub exit_code: i32,
    pub crash_count: i32,
    /// Unix seconds at which the container terminated
    pub crash_timestamp: i64,
}

#[async_trait]
pub trait CrashEventGenerator: Send + Sync {
    async fn generate(&self, pod: &Pod) -> Option<CrashEvent>;
}

pub struct DefaultCrashEventGenerator<S> {
    store: Arc<S>,
}

impl<S> DefaultCrashEventGenerator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> std::fmt::Debug for DefaultCrashEventGenerator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCrashEventGenerator").finish_non_exhaustive()
    }
}

impl<S: KubeStore> DefaultCrashEventGenerator<S> {
    /// Whether the most recent event of the pod says it is being stopped
    ///
    /// Events are ordered by last timestamp; events without one sort first.
    async fn is_being_stopped(&self, pod: &Pod) -> Option<bool> {
        let namespace = pod.namespace().unwrap_or_default();
        let selector = ListSelector::new()
            .field("involvedObject.kind", "Pod")
            .field("involvedObject.name", pod.name_any());

        match self.store.list::<Event>(&namespace, &selector).await {
            Ok(events) => Some(
                events
                    .iter()
                    .max_by_key(|e| e.last_timestamp.as_ref().and_then(to_utc))
                    .is_some_and(|e| e.reason.as_deref() == Some(KILLING_EVENT_REASON)),
            ),
            Err(err) => {
                error!(error = %err, "Skipping pod, failed to get its events");
                None
            }
        }
    }
}

#[async_trait]
impl<S: KubeStore> CrashEventGenerator for DefaultCrashEventGenerator<S> {
    async fn generate(&self, pod: &Pod) -> Option<CrashEvent> {
        let annotations = pod.annotations();
        let span = info_span!(
            "crash_event.generate",
            pod_name = %pod.name_any(),
            guid = %annotations.get(ANNOTATION_PROCESS_GUID).map_or("", String::as_str),
            version = %annotations.get(ANNOTATION_VERSION).map_or("", String::as_str),
        );

        async move {
            let statuses = pod
                .status
                .as_ref()
                .and_then(|s| s.container_statuses.as_deref())
                .unwrap_or_default();
            if statuses.is_empty() {
                return None;
            }

            if pod.labels().get(LABEL_SOURCE_TYPE).map(String::as_str) != Some(APP_SOURCE_TYPE) {
                debug!("Skipping pod not managed by the workload runner");
                return None;
            }

            let Some(status) = statuses
                .iter()
                .find(|s| s.name == APPLICATION_CONTAINER_NAME)
            else {
                debug!("Skipping pod without application container status");
                return None;
            };

            if let Some(terminated) = status.state.as_ref().and_then(|s| s.terminated.as_ref()) {
                if self.is_being_stopped(pod).await? {
                    debug!("Skipping pod that is being stopped");
                    return None;
                }
                return Some(crash_event(pod, status, terminated));
            }

            status
                .last_state
                .as_ref()
                .and_then(|s| s.terminated.as_ref())
                .map(|terminated| crash_event(pod, status, terminated))
        }
        .instrument(span)
        .await
    }
}

fn crash_event(pod: &Pod, status: &ContainerStatus, terminated: &ContainerStateTerminated) -> CrashEvent {
    let instance = pod.name_any();
    CrashEvent {
        process_guid: pod
            .annotations()
            .get(ANNOTATION_PROCESS_GUID)
            .cloned()
            .unwrap_or_default(),
        reason: terminated.reason.clone().unwrap_or_default(),
        index: parse_app_index(&instance).unwrap_or_default(),
        instance,
        exit_code: terminated.exit_code,
        crash_count: crash_count(status),
        crash_timestamp: terminated
            .finished_at
            .as_ref()
            .and_then(to_utc)
            .map_or(0, |t| t.timestamp()),
    }
}

// The kubelet increments the restart count when it restarts the container, so
// a container that is not running yet has one more crash than it reports.
fn crash_count(status: &ContainerStatus) -> i32 {
    let running = status.state.as_ref().is_some_and(|s| s.running.is_some());
    if running {
        status.restart_count
    } else {
        status.restart_count + 1
    }
}
