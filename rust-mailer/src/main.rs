//! Postmark Mailer - web service around the batch dispatcher.
//!
//! This binary:
//! - Accepts messages on `POST /send` and dispatches them to Postmark
//! - Records one delivery per recipient for every accepted message
//! - Links Postmark bounce webhooks on `POST /bounce` to those deliveries

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal, sync::mpsc};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postmark::{recorder, web, AppState, Config, Dispatcher, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("mailer_starting");

    // Load configuration; a missing API key is fatal
    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);
    info!(
        port = config.port,
        api_base = %config.api_base(),
        test_mode = config.test_mode,
        fail_silently = config.fail_silently,
        batch_size = config.batch_size,
        request_timeout_ms = config.request_timeout_ms,
        database_url = %config.database_url,
        "config_loaded"
    );

    let store = Store::connect(&config.database_url)
        .await
        .context("Failed to open record database")?;

    // Recorder task fed by the dispatcher
    let (events_tx, events_rx) = mpsc::channel(config.recorder_capacity);
    let recorder_task = tokio::spawn(recorder::run(events_rx, store.clone()));

    let dispatcher = Dispatcher::new(Arc::clone(&config))
        .context("Failed to create HTTP client")?
        .with_events(events_tx);

    let state = AppState::new(Arc::clone(&config), dispatcher, store.clone());
    let app = web::router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "mailer_listening");

    // Run server with graceful shutdown. Dropping the router drops the last
    // dispatcher, which closes the event channel and lets the recorder drain.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    recorder_task.await.context("Recorder task failed")?;
    store.close().await;

    info!("mailer_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("mailer_shutting_down");
}
