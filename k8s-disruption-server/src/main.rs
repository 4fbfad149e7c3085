use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt as _;
use k8s_disruption_controller::{
    ClusterState, DisruptionReconciler, GlobalSettings, ProvisionerHashDrift, SystemClock,
};
use k8s_disruption_ext as k8s;
use k8s_disruption_kubeapi::KubeApi;
use tokio::sync::watch;

use k8s::corev1;
use k8s::v1alpha5;

use axum::{Router, routing::get};
use kube::runtime::watcher;

mod cluster;
mod controller;
mod settings;

const DEFAULT_SYSTEM_NAMESPACE: &str = "karpenter";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    tracing::info!("Starting k8s-disruption-server");

    let namespace = std::env::var("SYSTEM_NAMESPACE")
        .unwrap_or_else(|_| DEFAULT_SYSTEM_NAMESPACE.to_string());

    let api = Arc::new(KubeApi::new().await?);
    let cluster = Arc::new(ClusterState::new());
    let (settings_tx, settings_rx) = watch::channel(GlobalSettings::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(cluster::watch_nodes(api.nodes(), cluster.clone()));
    tokio::spawn(cluster::watch_pods(api.pods(), cluster.clone()));
    tokio::spawn(settings::watch_settings(
        api.config_maps(&namespace),
        settings_tx,
    ));

    let reconciler = DisruptionReconciler::new(
        api.clone(),
        Arc::new(ProvisionerHashDrift::new(api.clone())),
        cluster,
        Arc::new(SystemClock),
    );
    let context = Arc::new(controller::Context::new(
        reconciler,
        api.clone(),
        settings_rx,
        shutdown_rx.clone(),
    ));
    let controller = tokio::spawn(async move { controller::run(&api, context).await });

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutting down");
        shutdown_tx.send_replace(true);
    });

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{addr}");
    }
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown(shutdown_rx))
        .await?;

    controller.await?;

    Ok(())
}

fn router() -> Router {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Resolves once shutdown has been requested
///
async fn shutdown(mut shutdown: watch::Receiver<bool>) {
    // a dropped sender means nobody can request shutdown any more
    if shutdown.wait_for(|shutdown| *shutdown).await.is_err() {
        std::future::pending::<()>().await;
    }
}
