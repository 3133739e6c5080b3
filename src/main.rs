use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dispatch_tracker::api;
use dispatch_tracker::config::Config;
use dispatch_tracker::engine::offers::start_offer_sweeper;
use dispatch_tracker::error::AppError;
use dispatch_tracker::realtime::heartbeat::start_heartbeat;
use dispatch_tracker::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    let http_port = config.http_port;
    let shared_state = Arc::new(AppState::new(config));

    start_heartbeat(shared_state.sessions.clone(), shared_state.heartbeat_interval());
    start_offer_sweeper(
        shared_state.coordinator.clone(),
        shared_state.offer_sweep_interval(),
    );

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
