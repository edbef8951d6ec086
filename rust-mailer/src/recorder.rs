//! Delivery recorder.
//!
//! Consumes [`SentEvent`]s from the dispatcher and stores one
//! [`DeliveryRecord`](crate::store::DeliveryRecord) per recipient. Failures
//! are logged and never reach the send path.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::dispatch::{DispatchError, Dispatcher, SentEvent};
use crate::message::{OutgoingMessage, TranslatedMessage};
use crate::store::{NewDelivery, RecipientKind, Store, StoreError};
use crate::timestamp::{parse_provider_timestamp, MalformedTimestamp};

/// Why an event could not be turned into delivery records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("send outcome has no MessageID")]
    MissingMessageId,
    #[error("send outcome has no SubmittedAt")]
    MissingSubmittedAt,
    #[error(transparent)]
    MalformedTimestamp(#[from] MalformedTimestamp),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Split To, then Cc, then Bcc into individual addresses. Blanks are skipped.
pub fn expand_recipients(message: &TranslatedMessage) -> Vec<(String, RecipientKind)> {
    let lists = [
        (Some(message.to.as_str()), RecipientKind::To),
        (message.cc.as_deref(), RecipientKind::Cc),
        (message.bcc.as_deref(), RecipientKind::Bcc),
    ];

    lists
        .into_iter()
        .filter_map(|(list, kind)| list.map(|l| (l, kind)))
        .flat_map(|(list, kind)| {
            list.split(',')
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(move |address| (address.to_string(), kind))
        })
        .collect()
}

/// Build the delivery records for one sent message.
pub fn build_deliveries(event: &SentEvent) -> Result<Vec<NewDelivery>, RecordError> {
    let message = &event.message;
    let outcome = &event.outcome;

    let message_id = outcome
        .message_id
        .clone()
        .ok_or(RecordError::MissingMessageId)?;
    let submitted_at = outcome
        .submitted_at
        .as_deref()
        .ok_or(RecordError::MissingSubmittedAt)?;
    let submitted_at = parse_provider_timestamp(submitted_at)?;

    let headers = serialize_list(&message.headers);
    let attachments = serialize_list(&message.attachments);

    Ok(expand_recipients(message)
        .into_iter()
        .map(|(to, to_type)| NewDelivery {
            message_id: message_id.clone(),
            submitted_at,
            status: outcome.message.clone().unwrap_or_default(),
            to,
            to_type,
            sender: message.from.clone(),
            reply_to: message.reply_to.clone().unwrap_or_default(),
            subject: message.subject.clone(),
            tag: message.tag.clone().unwrap_or_default(),
            text_body: message.text_body.clone(),
            html_body: message.html_body.clone().unwrap_or_default(),
            headers: headers.clone(),
            attachments: attachments.clone(),
        })
        .collect())
}

/// Store the delivery records for one event and return how many were created.
pub async fn record(store: &Store, event: &SentEvent) -> Result<usize, RecordError> {
    let deliveries = build_deliveries(event)?;
    let count = deliveries.len();

    for delivery in deliveries {
        let stored = store.insert_delivery(delivery).await?;
        info!(
            delivery_id = stored.id,
            message_id = %stored.message_id,
            to = %stored.to,
            to_type = stored.to_type.as_str(),
            "delivery_recorded"
        );
    }

    Ok(count)
}

/// Record events until every sender of the channel is gone.
pub async fn run(mut events: mpsc::Receiver<SentEvent>, store: Store) {
    info!("recorder_started");

    while let Some(event) = events.recv().await {
        if let Err(e) = record(&store, &event).await {
            error!(
                message_id = ?event.outcome.message_id,
                submitted_at = ?event.outcome.submitted_at,
                to = %event.message.to,
                error = %e,
                "delivery_record_failed"
            );
        }
    }

    info!("recorder_stopped");
}

/// Send `messages` and record every accepted one before returning.
///
/// Runs its own recorder for the duration of the call, so every delivery is
/// stored once this returns, even when a later batch failed.
pub async fn send_and_record(
    dispatcher: Dispatcher,
    store: Store,
    messages: &[OutgoingMessage],
) -> Result<usize, DispatchError> {
    let (events_tx, events_rx) = mpsc::channel(dispatcher.config().recorder_capacity.max(1));
    let recorder_task = tokio::spawn(run(events_rx, store));

    let dispatcher = dispatcher.with_events(events_tx);
    let result = dispatcher.send_messages(messages).await;

    // The dispatcher holds the only sender; dropping it lets the recorder drain.
    drop(dispatcher);
    if let Err(e) = recorder_task.await {
        error!(error = %e, "recorder_task_failed");
    }

    result
}

/// JSON text of a header or attachment list, empty when there is nothing to store.
fn serialize_list<T: Serialize>(items: &[T]) -> String {
    if items.is_empty() {
        return String::new();
    }
    serde_json::to_string(items).unwrap_or_default()
}
