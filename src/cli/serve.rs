//! Serve command - starts the HTTP receiver.

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::server::{build_router, AppState};
use crate::templates::t;

/// Execute the serve command
pub async fn execute(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let state = AppState::from_config(&config).await?;

    for command in state.registry.list().await {
        tracing::debug!("Registered {} - {}", command.usage, command.description);
    }

    let host = host.unwrap_or_else(|| config.hostname().to_string());
    let port = port.unwrap_or_else(|| config.port());
    let addr = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", listener.local_addr()?);
    tracing::info!(
        "{}",
        t("app.startup", &[("environment", config.environment())])
    );

    let tasks = state.tasks.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    // Let commands that were already acknowledged finish
    tracing::info!("{}", t("app.shutdown", &[]));
    tasks.close();
    tasks.wait().await;

    Ok(())
}
