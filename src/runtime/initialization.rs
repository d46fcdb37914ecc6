//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client creation and wiring of the reconcilers.

use crate::config::{ControllerConfig, ServerConfig, WorkloadConfig};
use crate::controller::reconciler::{LrpReconciler, PodCrashReconciler, TaskReconciler};
use crate::event::DefaultCrashEventGenerator;
use crate::observability;
use crate::server::{start_server, ServerState};
use crate::store::{KubeApiStore, KubeStore};
use crate::workload::jobs::{JobDesirer, TaskToJob};
use crate::workload::stset::{
    create_liveness_probe, create_readiness_probe, LrpToStatefulSet, PdbUpdater,
    PodDisruptionBudgetUpdater, StatefulSetDesirer, StatefulSetUpdater,
};
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controllers
pub struct InitializationResult {
    pub client: Client,
    pub store: Arc<KubeApiStore>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
    pub server_config: ServerConfig,
    pub workload_config: WorkloadConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("controller_config", &self.controller_config)
            .field("server_config", &self.server_config)
            .field("workload_config", &self.workload_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow!("Failed to install rustls crypto provider"));
    }

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    let workload_config = WorkloadConfig::from_env();

    init_tracing(&controller_config);

    info!("Starting Korifi workload runner");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let metrics_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(metrics_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let store = Arc::new(KubeApiStore::new(client.clone()));

    match &controller_config.workloads_namespace {
        Some(namespace) => info!("Watching workloads in namespace {}", namespace),
        None => info!("Watching workloads in all namespaces"),
    }

    Ok(InitializationResult {
        client,
        store,
        server_state,
        controller_config,
        server_config,
        workload_config,
    })
}

/// Set up the tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL`; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "korifi_workload_runner={level},workload_runner={level}",
            level = config.log_level
        )
        .into()
    });

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// LRP reconciler with the StatefulSet desirer, updater and PDB updater
pub fn lrp_reconciler<S: KubeStore>(store: Arc<S>, config: &WorkloadConfig) -> LrpReconciler<S> {
    let pdb_updater: Arc<dyn PdbUpdater> =
        Arc::new(PodDisruptionBudgetUpdater::new(Arc::clone(&store)));
    let converter = Arc::new(LrpToStatefulSet::new(
        config.clone(),
        create_liveness_probe,
        create_readiness_probe,
    ));
    let desirer = Arc::new(StatefulSetDesirer::new(
        Arc::clone(&store),
        converter,
        Arc::clone(&pdb_updater),
    ));
    let updater = Arc::new(StatefulSetUpdater::new(Arc::clone(&store), pdb_updater));

    LrpReconciler::new(store, desirer, updater)
}

/// Task reconciler with the Job desirer
pub fn task_reconciler<S: KubeStore>(store: Arc<S>, config: &WorkloadConfig, ttl: Duration) -> TaskReconciler<S> {
    let converter = Arc::new(TaskToJob::new(config.clone()));
    let desirer = Arc::new(JobDesirer::new(Arc::clone(&store), converter));

    TaskReconciler::new(store, desirer, ttl)
}

/// Pod crash reconciler with the default crash event generator
pub fn pod_crash_reconciler<S: KubeStore>(store: Arc<S>) -> PodCrashReconciler<S> {
    let generator = Arc::new(DefaultCrashEventGenerator::new(Arc::clone(&store)));

    PodCrashReconciler::new(store, generator)
}

/// Wait for the HTTP server to bind
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
