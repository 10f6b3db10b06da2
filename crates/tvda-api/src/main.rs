//! # tvda-api — Binary Entry Point
//!
//! Starts the Axum HTTP server and the background workflow ticker.
//! Binds to the configured port (default 8080).

use tvda_api::{AppConfig, AppState, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize structured tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let port = config.port;
    let tick_interval = config.workflow.tick_interval;
    let state = AppState::with_config(config).map_err(|e| {
        tracing::error!("Startup failed: {e}");
        e
    })?;

    let ticker = tvda_api::spawn_ticker(state.clone(), tick_interval);
    tracing::info!(interval_secs = tick_interval.as_secs(), "workflow ticker started");

    let app = tvda_api::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("TVDA API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    ticker.abort();
    Ok(())
}
