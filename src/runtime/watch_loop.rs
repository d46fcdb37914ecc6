//! # Watch Loop
//!
//! Runs a kube-runtime `Controller` for one resource kind and restarts it when
//! its watch stream ends, until shutdown is requested.

use crate::controller::reconciler::{
    ControllerContext, LrpReconciler, PodCrashReconciler, ReconcilerError, TaskReconciler,
};
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::server::ServerState;
use crate::store::KubeStore;
use async_trait::async_trait;
use futures::StreamExt;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::Controller;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// A reconciler the watch loop can drive
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError>;
}

#[async_trait]
impl<S: KubeStore> Reconcile for LrpReconciler<S> {
    async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        LrpReconciler::reconcile(self, namespace, name).await
    }
}

#[async_trait]
impl<S: KubeStore> Reconcile for TaskReconciler<S> {
    async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        TaskReconciler::reconcile(self, namespace, name).await
    }
}

#[async_trait]
impl<S: KubeStore> Reconcile for PodCrashReconciler<S> {
    async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        PodCrashReconciler::reconcile(self, namespace, name).await
    }
}

/// Watch stream backoff bounds for throttled API servers (milliseconds)
#[derive(Debug, Clone, Copy)]
pub struct WatchBackoff {
    pub start_ms: u64,
    pub max_ms: u64,
}

impl Default for WatchBackoff {
    fn default() -> Self {
        Self {
            start_ms: 500,
            max_ms: 30_000,
        }
    }
}

/// Run the controller built by `build` until shutdown
///
/// `build` is called again every time the watch stream ends, so it must
/// produce a fresh controller.
pub async fn run_watch_loop<K, R>(
    build: impl Fn() -> Controller<K>,
    ctx: Arc<ControllerContext<R>>,
    server_state: Arc<ServerState>,
    watch_restart_delay: Duration,
    watch_backoff: WatchBackoff,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Eq + Hash + Clone + Debug + Unpin,
    R: Reconcile,
{
    let name = ctx.name;
    let backoff = Arc::new(AtomicU64::new(watch_backoff.start_ms));

    loop {
        let watch_span = tracing::span!(tracing::Level::INFO, "controller.watch", controller = name);
        info!(parent: &watch_span, "Starting {} controller watch loop...", name);

        let backoff = Arc::clone(&backoff);
        build()
            .shutdown_on_signal()
            .run(reconcile::<K, R>, handle_reconciliation_error::<K, R>, Arc::clone(&ctx))
            .for_each(|result| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match result {
                        Ok((obj, _)) => {
                            backoff.store(watch_backoff.start_ms, Ordering::Relaxed);
                            debug!(object = %obj.name, "watch.event.reconciled");
                        }
                        // Already handled by the error policy
                        Err(controller::Error::ReconcilerFailed(..)) => {}
                        Err(err) => {
                            let error_string = format!("{err:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                watch_backoff.max_ms,
                                watch_restart_delay.as_secs(),
                            )
                            .await;
                        }
                    }
                }
            })
            .instrument(watch_span)
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            break;
        }

        warn!(
            "{} controller watch stream ended, restarting in {} seconds...",
            name,
            watch_restart_delay.as_secs()
        );
        tokio::time::sleep(watch_restart_delay).await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            break;
        }
    }

    info!("{} controller stopped gracefully", name);
}

async fn reconcile<K, R>(obj: Arc<K>, ctx: Arc<ControllerContext<R>>) -> Result<Action, ReconcilerError>
where
    K: Resource,
    R: Reconcile,
{
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let start = Instant::now();

    metrics::increment_reconciliations(ctx.name);
    let result = ctx.reconciler.reconcile(&namespace, &name).await;
    metrics::observe_reconciliation_duration(ctx.name, start.elapsed().as_secs_f64());

    if result.is_ok() {
        ctx.reset_backoff(&format!("{namespace}/{name}"));
    }
    result
}
