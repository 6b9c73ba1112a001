use std::sync::Arc;

use anyhow::Context;

use stockhold_api::app::{build_app, build_services};
use stockhold_infra::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockhold_observability::init();

    let config = EngineConfig::from_env();
    let services = match build_services(config).await {
        Ok(services) => Arc::new(services),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise inventory services");
            return Err(e);
        }
    };

    services
        .start_sweeper()
        .context("failed to start expiry sweeper")?;

    let bind = std::env::var("STOCKHOLD_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    let app = build_app(services.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The runner thread blocks on join; keep it off the async workers.
    let sweeper = services.clone();
    tokio::task::spawn_blocking(move || sweeper.shutdown_sweeper()).await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
