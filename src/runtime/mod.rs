//! # Runtime
//!
//! Process wiring for the workload runner.
//!
//! - `initialization.rs` - tracing, metrics server, Kubernetes client, reconciler wiring
//! - `watch_loop.rs` - kube-runtime controllers and their restart loop
//! - `error_policy.rs` - backoff after reconciliation and watch errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use crate::constants::{APP_SOURCE_TYPE, LABEL_SOURCE_TYPE};
use crate::controller::reconciler::ControllerContext;
use crate::crd::{Lrp, Task};
use crate::server::ServerState;
use crate::webhook::start_webhook_server;
use initialization::{lrp_reconciler, pod_crash_reconciler, task_reconciler, InitializationResult};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use watch_loop::{run_watch_loop, WatchBackoff};

/// Run the three controllers and the webhook server until shutdown
pub async fn run(init: InitializationResult) -> anyhow::Result<()> {
    let InitializationResult {
        client,
        store,
        server_state,
        controller_config,
        server_config,
        workload_config,
    } = init;

    let namespace = controller_config.workloads_namespace.clone();
    let restart_delay = controller_config.watch_restart_delay_duration();
    let backoff_min = controller_config.backoff_min_secs;
    let backoff_max = controller_config.backoff_max_secs;

    let lrp_ctx = Arc::new(ControllerContext::new(
        "lrp",
        lrp_reconciler(Arc::clone(&store), &workload_config),
        backoff_min,
        backoff_max,
    ));
    let task_ctx = Arc::new(ControllerContext::new(
        "task",
        task_reconciler(Arc::clone(&store), &workload_config, controller_config.task_ttl()),
        backoff_min,
        backoff_max,
    ));
    let pod_crash_ctx = Arc::new(ControllerContext::new(
        "pod_crash",
        pod_crash_reconciler(Arc::clone(&store)),
        backoff_min,
        backoff_max,
    ));

    tokio::spawn(async move {
        if let Err(e) = start_webhook_server(&server_config).await {
            error!("Webhook server error: {:#}", e);
        }
    });

    spawn_shutdown_handler(Arc::clone(&server_state));
    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("Controllers initialized, starting watch loops...");

    let lrp_controller = {
        let client = client.clone();
        let namespace = namespace.clone();
        move || {
            Controller::new(
                api::<Lrp>(&client, namespace.as_deref()),
                watcher::Config::default().any_semantic(),
            )
            .owns(
                api::<StatefulSet>(&client, namespace.as_deref()),
                watcher::Config::default(),
            )
        }
    };
    let task_controller = {
        let client = client.clone();
        let namespace = namespace.clone();
        move || {
            Controller::new(
                api::<Task>(&client, namespace.as_deref()),
                watcher::Config::default().any_semantic(),
            )
            .owns(
                api::<Job>(&client, namespace.as_deref()),
                watcher::Config::default(),
            )
        }
    };
    let pod_controller = move || {
        Controller::new(
            api::<Pod>(&client, namespace.as_deref()),
            watcher::Config::default().labels(&format!("{LABEL_SOURCE_TYPE}={APP_SOURCE_TYPE}")),
        )
    };

    tokio::join!(
        run_watch_loop(
            lrp_controller,
            lrp_ctx,
            Arc::clone(&server_state),
            restart_delay,
            WatchBackoff::default(),
        ),
        run_watch_loop(
            task_controller,
            task_ctx,
            Arc::clone(&server_state),
            restart_delay,
            WatchBackoff::default(),
        ),
        run_watch_loop(
            pod_controller,
            pod_crash_ctx,
            Arc::clone(&server_state),
            restart_delay,
            WatchBackoff::default(),
        ),
    );

    info!("Workload runner stopped gracefully");
    Ok(())
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Mark the process as not ready on SIGTERM or SIGINT so watch loops stop restarting
fn spawn_shutdown_handler(server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        server_state.is_ready.store(false, Ordering::Relaxed);
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
