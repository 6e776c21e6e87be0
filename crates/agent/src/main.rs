//! Resize Agent - in-place CPU/memory resizing for a single workload
//!
//! This binary runs next to (or inside) the workload it manages and serves
//! a small HTTP API for reading and patching its container resources.

use agent_lib::{
    health::{components, HealthRegistry},
    KubeWorkloadApi, ResizeService,
};
use anyhow::{Context, Result};
use resize_agent::{api, config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting resize-agent");

    let config = config::AgentConfig::load()?;
    let target = config.workload()?;
    let service_config = config.service_config()?;
    info!(workload = %target, port = config.api_port, "Agent configured");

    if std::env::var_os("KUBERNETES_SERVICE_HOST").is_some() {
        info!("Running inside a Kubernetes cluster, using in-cluster configuration");
    } else {
        info!("Running outside a Kubernetes cluster, using local kubeconfig");
    }
    let client = kube::Client::try_default()
        .await
        .context("Failed to initialize Kubernetes client")?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ORCHESTRATOR).await;
    health_registry.register(components::API).await;

    let service = ResizeService::new(
        Arc::new(KubeWorkloadApi::new(client)),
        target,
        service_config,
        health_registry.clone(),
    );
    let logger = service.logger().clone();
    logger.log_startup(AGENT_VERSION);

    let app_state = Arc::new(api::AppState::new(service, health_registry.clone()));

    health_registry.set_ready(true).await;

    let shutdown = async move {
        let reason = shutdown_signal().await;
        logger.log_shutdown(reason);
    };
    api::serve(config.api_port, app_state, shutdown).await?;

    info!("Shutting down");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM, naming the signal
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}
