//! Postmark Send - one-shot batch sender.
//!
//! Reads a JSON array of messages from stdin, dispatches them with the same
//! configuration as the service, records every accepted delivery in the
//! record database and prints the number Postmark accepted.
//! Logs go to stderr so stdout carries only the count.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postmark::{recorder, Config, Dispatcher, OutgoingMessage, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read stdin")?;

    let messages: Vec<OutgoingMessage> =
        serde_json::from_str(&raw).context("stdin is not a JSON array of messages")?;

    info!(
        messages = messages.len(),
        test_mode = config.test_mode,
        database_url = %config.database_url,
        "send_starting"
    );

    let store = Store::connect(&config.database_url)
        .await
        .context("Failed to open record database")?;
    let dispatcher = Dispatcher::new(config).context("Failed to create HTTP client")?;

    // Deliveries of batches accepted before a failure are stored either way.
    let result = recorder::send_and_record(dispatcher, store.clone(), &messages).await;
    store.close().await;

    let sent = result.context("Dispatch failed")?;
    println!("{}", sent);

    Ok(())
}
