//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loops.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{ControllerContext, ReconcilerError};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Delay used when the backoff state cannot be read
const FALLBACK_BACKOFF_SECS: u64 = 60;

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing object does not slow
/// down the others.
pub fn handle_reconciliation_error<K: ResourceExt, R>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<ControllerContext<R>>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        controller = ctx.name,
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    metrics::increment_reconciliation_errors(ctx.name);

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = ctx.record_error(&resource_key).unwrap_or_else(|| {
        warn!("Using default backoff of {}s", FALLBACK_BACKOFF_SECS);
        (FALLBACK_BACKOFF_SECS, 0)
    });

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds, error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s, trigger source: error-backoff)",
        next_trigger_time.to_rfc3339(),
        backoff_seconds
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Handle watch stream errors with classification and backoff
///
/// Sleeps as needed before the stream is polled again. The controller's own
/// watcher re-lists after every error, so the stream always continues.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    async move {
        // 404 is checked first, a plain text 404 body surfaces as a watch failure too
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        let is_401 =
            (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
        let is_410 = error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone");
        let is_429 = error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests");

        if is_401 {
            error!(
                "❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!("🔍 Check that the workload runner service account can still watch LRPs, Tasks, Pods, StatefulSets and Jobs");
            warn!(
                "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        } else if is_410 {
            warn!(error_type = "410", "Watch resource version expired, watch will restart");
        } else if is_429 {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            backoff.store(
                current_backoff.saturating_mul(2).min(max_backoff_ms),
                Ordering::Relaxed,
            );
        } else if is_not_found {
            warn!(
                "Resource not found (404) - normal if it was just deleted, check the CRDs are installed otherwise. Error: {}",
                error_string
            );
        } else {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        }
    }
    .instrument(error_span)
    .await
}
