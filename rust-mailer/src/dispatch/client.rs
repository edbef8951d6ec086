//! Batch dispatcher for the Postmark batch endpoint.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use super::error::DispatchError;
use super::response::{classify, SendOutcome};
use crate::config::Config;
use crate::message::{translate_all, OutgoingMessage, TranslatedMessage};
use crate::timestamp::format_provider_timestamp;

/// Header carrying the Postmark server token.
pub const SERVER_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// Status message the sandbox reports for every message.
pub const SANDBOX_STATUS: &str = "Test job accepted";

/// Emitted once per successfully sent message, in submission order.
#[derive(Debug, Clone)]
pub struct SentEvent {
    pub message: TranslatedMessage,
    pub outcome: SendOutcome,
}

/// Sends messages to Postmark in batches.
///
/// Cheap to clone; clones share the HTTP client and the event channel.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    config: Arc<Config>,
    events: Option<mpsc::Sender<SentEvent>>,
}

impl Dispatcher {
    /// Create a dispatcher whose HTTP client enforces the configured timeout.
    pub fn new(config: Arc<Config>) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(16)
            .build()?;

        Ok(Self {
            client,
            config,
            events: None,
        })
    }

    /// Publish a [`SentEvent`] for every successful send on `events`.
    pub fn with_events(mut self, events: mpsc::Sender<SentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send messages and return how many the provider accepted.
    ///
    /// Messages are translated, split into batches of `batch_size` and posted
    /// one batch at a time. Errors abort the call unless fail-silently is set,
    /// in which case they turn into outcomes that simply don't count.
    pub async fn send_messages(&self, messages: &[OutgoingMessage]) -> Result<usize, DispatchError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let translated = translate_all(messages, self.config.fail_silently)?;
        let batch_size = self.config.batch_size.max(1);
        let mut sent = 0;

        for (batch_index, batch) in translated.chunks(batch_size).enumerate() {
            let outcomes = match self.send_batch(batch).await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    error!(
                        batch_index = batch_index,
                        batch_len = batch.len(),
                        sent_so_far = sent,
                        error = %e,
                        "dispatch_batch_failed"
                    );
                    return Err(e);
                }
            };

            for (message, outcome) in batch.iter().zip(outcomes) {
                if outcome.is_success() {
                    sent += 1;
                    self.notify(message, outcome).await;
                }
            }

            info!(
                batch_index = batch_index,
                batch_len = batch.len(),
                sent_so_far = sent,
                "dispatch_batch_complete"
            );
        }

        info!(
            submitted = messages.len(),
            translated = translated.len(),
            sent = sent,
            test_mode = self.config.test_mode,
            "dispatch_complete"
        );

        Ok(sent)
    }

    /// Submit one batch and return one outcome per message.
    async fn send_batch(&self, batch: &[TranslatedMessage]) -> Result<Vec<SendOutcome>, DispatchError> {
        if self.config.test_mode {
            info!(batch_len = batch.len(), "dispatch_sandbox_batch");
            return Ok(batch.iter().map(sandbox_outcome).collect());
        }

        let url = self.config.batch_url();
        info!(url = %url, batch_len = batch.len(), "dispatch_batch_starting");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header(SERVER_TOKEN_HEADER, &self.config.api_key)
            .json(batch)
            .send()
            .await
            .map_err(|e| log_transport_error(&url, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| log_transport_error(&url, e))?;

        info!(
            url = %url,
            status_code = status,
            body_length = body.len(),
            "dispatch_batch_response"
        );

        classify(status, &body, batch.len(), self.config.fail_silently)
    }

    async fn notify(&self, message: &TranslatedMessage, outcome: SendOutcome) {
        let Some(events) = &self.events else {
            return;
        };

        let event = SentEvent {
            message: message.clone(),
            outcome,
        };

        if let Err(e) = events.send(event).await {
            error!(
                message_id = ?e.0.outcome.message_id,
                to = %e.0.message.to,
                "post_send_event_dropped"
            );
        }
    }
}

/// Outcome reported for every message in test mode.
fn sandbox_outcome(message: &TranslatedMessage) -> SendOutcome {
    SendOutcome {
        error_code: 0,
        http_status: 200,
        message_id: Some(Uuid::new_v4().to_string()),
        message: Some(SANDBOX_STATUS.to_string()),
        submitted_at: Some(format_provider_timestamp(Utc::now())),
        to: Some(message.to.clone()),
    }
}

fn log_transport_error(url: &str, e: reqwest::Error) -> DispatchError {
    if e.is_timeout() {
        error!(url = %url, error = %e, "dispatch_batch_timeout");
    } else {
        error!(url = %url, error = %e, "dispatch_batch_request_error");
    }
    DispatchError::from(e)
}
