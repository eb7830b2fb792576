// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use futures::StreamExt;
use klusterlet_addon_controller::{
    config::ControllerConfig,
    constants::{KIND_KLUSTERLET_ADDON_CONFIG, KIND_MANAGED_CLUSTER, TOKIO_WORKER_THREADS},
    context::Context,
    crd::{KlusterletAddonConfig, ManagedCluster, ManagedClusterAddOn},
    metrics,
    predicates::dependent_deletions,
    reconcilers::{reconcile_klusterlet_addon_config, reconcile_orphaned_cluster, ReconcileError},
    server::{start_server, ServerState},
    store::{KubeStore, ObjectKey},
};
use kube::{
    runtime::{controller::Action, reflector::ObjectRef, watcher, watcher::Config, Controller, WatchStreamExt},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

type Ctx = Context<KubeStore>;

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("klusterlet-addon-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting klusterlet add-on controller");

    let config = ControllerConfig::from_env();
    debug!(?config, "Loaded controller configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let metrics_addr = config.metrics_socket_address();
    let ctx = Arc::new(Context::new(KubeStore::new(client.clone()), config));
    let server_state = Arc::new(ServerState::default());

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = run_klusterlet_addon_config_controller(client.clone(), ctx.clone(), server_state.clone()) => {
            error!("CRITICAL: KlusterletAddonConfig controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("KlusterletAddonConfig controller exited unexpectedly without error")
        }
        result = run_managed_cluster_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: ManagedCluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ManagedCluster controller exited unexpectedly without error")
        }
        result = start_server(&metrics_addr, server_state.clone()) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
    }
}

/// Run the `KlusterletAddonConfig` controller
///
/// Triggered by the config itself, by its `ManagedCluster` (mapped to
/// `<cluster>/<cluster>`), and by out-of-band deletion of an owned
/// `ManagedClusterAddOn`.
///
/// The server reports ready once the initial list of configs has been cached.
async fn run_klusterlet_addon_config_controller(
    client: Client,
    ctx: Arc<Ctx>,
    server_state: Arc<ServerState>,
) -> Result<()> {
    info!("Starting KlusterletAddonConfig controller");

    let configs = Api::<KlusterletAddonConfig>::all(client.clone());
    let clusters = Api::<ManagedCluster>::all(client.clone());
    let addons = Api::<ManagedClusterAddOn>::all(client);

    let addon_deletions =
        dependent_deletions(watcher(addons, Config::default()).default_backoff());

    let controller = Controller::new(configs, Config::default())
        .owns_stream(addon_deletions)
        .watches(clusters, Config::default(), config_for_cluster);
    let cache = controller.store();

    let readiness = server_state.set_ready_when(async move {
        cache.wait_until_ready().await.is_ok()
    });

    let backoff_ctx = ctx.clone();
    let reconciling = controller
        .shutdown_on_signal()
        .run(reconcile_config_wrapper, error_policy, ctx)
        .for_each(move |result| {
            let ctx = backoff_ctx.clone();
            async move {
                match result {
                    Ok((obj, action)) => debug!("Reconciled {}: {:?}", obj, action),
                    Err(kube::runtime::controller::Error::ObjectNotFound(obj)) => {
                        debug!("Object no longer exists (likely deleted): {}", obj);
                        ctx.backoff.reset(&ObjectKey::from(&obj).to_string());
                    }
                    Err(e) => warn!("KlusterletAddonConfig controller error: {}", e),
                }
            }
        });

    tokio::join!(readiness, reconciling);

    Ok(())
}

/// Map a `ManagedCluster` to the `KlusterletAddonConfig` in its namespace.
///
/// The config shares the cluster's name and lives in the cluster namespace.
fn config_for_cluster(cluster: ManagedCluster) -> Option<ObjectRef<KlusterletAddonConfig>> {
    let name = cluster.name_any();
    Some(ObjectRef::new(&name).within(&name))
}

/// Run the `ManagedCluster` controller that releases orphaned clusters
async fn run_managed_cluster_controller(client: Client, ctx: Arc<Ctx>) -> Result<()> {
    info!("Starting ManagedCluster controller");

    let clusters = Api::<ManagedCluster>::all(client);

    let backoff_ctx = ctx.clone();
    Controller::new(clusters, Config::default())
        .shutdown_on_signal()
        .run(reconcile_cluster_wrapper, error_policy_cluster, ctx)
        .for_each(move |result| {
            if let Err(kube::runtime::controller::Error::ObjectNotFound(obj)) = &result {
                backoff_ctx.backoff.reset(&ObjectKey::from(obj).to_string());
            }
            futures::future::ready(())
        })
        .await;

    Ok(())
}

/// Reconcile wrapper for `KlusterletAddonConfig`
async fn reconcile_config_wrapper(
    config: Arc<KlusterletAddonConfig>,
    ctx: Arc<Ctx>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let key = ObjectKey::of(config.as_ref());

    match reconcile_klusterlet_addon_config(&ctx, &key).await {
        Ok(directive) => {
            ctx.backoff.reset(&key.to_string());
            metrics::record_reconciliation_success(KIND_KLUSTERLET_ADDON_CONFIG, start.elapsed());
            metrics::record_requeue(KIND_KLUSTERLET_ADDON_CONFIG, directive.reason());
            Ok(directive.into())
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_KLUSTERLET_ADDON_CONFIG, start.elapsed());
            Err(e)
        }
    }
}

/// Reconcile wrapper for `ManagedCluster`
async fn reconcile_cluster_wrapper(
    cluster: Arc<ManagedCluster>,
    ctx: Arc<Ctx>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = cluster.name_any();

    match reconcile_orphaned_cluster(&ctx, &name).await {
        Ok(directive) => {
            ctx.backoff.reset(&name);
            metrics::record_reconciliation_success(KIND_MANAGED_CLUSTER, start.elapsed());
            Ok(directive.into())
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_MANAGED_CLUSTER, start.elapsed());
            Err(e)
        }
    }
}

/// Error policy for the `KlusterletAddonConfig` controller
fn error_policy(config: Arc<KlusterletAddonConfig>, err: &ReconcileError, ctx: Arc<Ctx>) -> Action {
    let key = ObjectKey::of(config.as_ref()).to_string();
    let delay = ctx.backoff.next_delay(&key);
    warn!(key = %key, "Requeueing after failure in {}s: {}", delay.as_secs(), err);
    metrics::record_requeue(KIND_KLUSTERLET_ADDON_CONFIG, "error");
    Action::requeue(delay)
}

/// Error policy for the `ManagedCluster` controller
fn error_policy_cluster(cluster: Arc<ManagedCluster>, err: &ReconcileError, ctx: Arc<Ctx>) -> Action {
    let name = cluster.name_any();
    let delay = ctx.backoff.next_delay(&name);
    warn!(name = %name, "Requeueing after failure in {}s: {}", delay.as_secs(), err);
    Action::requeue(delay)
}
