use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use warehouse_api::app::{build_app, services::build_services};
use warehouse_infra::WarehouseConfig;

/// In-flight requests get this long to finish after a shutdown signal.
const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warehouse_observability::init();
    tracing::info!("starting warehouse service");

    let config = WarehouseConfig::from_env().context("reading configuration")?;
    let services = Arc::new(build_services(&config).await?);
    let app = build_app(services.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, timeout_ms = config.http.timeout.as_millis() as u64, "listening");

    let on_shutdown = services.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tokio::spawn(async move {
                tokio::time::sleep(GRACEFUL_SHUTDOWN).await;
                tracing::warn!("grace period elapsed; cancelling in-flight requests");
                on_shutdown.cancel_in_flight();
            });
        })
        .await
        .context("serving HTTP")?;

    services.close().await;
    tracing::info!("stopped warehouse service");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received: shutting down the server");
}
