//! HTTP endpoint handlers.
//!
//! - `POST /send`: dispatch a JSON array of messages
//! - `POST /bounce`: Postmark bounce webhook
//! - `GET /messages`: list delivery records with their bounces

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::dispatch::{DispatchError, Dispatcher};
use crate::message::OutgoingMessage;
use crate::store::{BounceRecord, BounceType, DeliveryRecord, RecordFilter, Store, StoreError};
use crate::timestamp::{parse_provider_timestamp, MalformedTimestamp};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub store: Store,
}

impl AppState {
    pub fn new(config: Arc<Config>, dispatcher: Dispatcher, store: Store) -> Self {
        Self {
            config,
            dispatcher,
            store,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Send
// =============================================================================

/// Response of the send endpoint.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Send endpoint.
///
/// Dispatches the messages and answers with the number Postmark accepted.
pub async fn send_messages(
    State(state): State<AppState>,
    Json(messages): Json<Vec<OutgoingMessage>>,
) -> impl IntoResponse {
    info!(
        messages = messages.len(),
        test_mode = state.config.test_mode,
        "send_request_received"
    );

    match state.dispatcher.send_messages(&messages).await {
        Ok(sent) => (
            StatusCode::OK,
            Json(SendResponse {
                status: "ok",
                sent: Some(sent),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "send_request_failed");
            (
                dispatch_error_status(&e),
                Json(SendResponse {
                    status: "error",
                    sent: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// HTTP status for a failed dispatch.
///
/// Caller mistakes are 400 or 422 and timeouts 504. Everything else,
/// including a rejected server token, is an upstream failure and maps to 502.
fn dispatch_error_status(e: &DispatchError) -> StatusCode {
    match e {
        DispatchError::Translation(_) => StatusCode::BAD_REQUEST,
        DispatchError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::Unauthorized
        | DispatchError::ProviderServerError { .. }
        | DispatchError::MalformedResponse(_)
        | DispatchError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// Bounce Webhook
// =============================================================================

/// Postmark bounce webhook payload. Fields not listed here are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BouncePayload {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Type")]
    pub bounce_type: BounceType,
    #[serde(rename = "MessageID", default)]
    pub message_id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    pub bounced_at: String,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub can_activate: bool,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Bounce webhook failures.
#[derive(Debug, Error)]
pub enum BounceError {
    #[error("no delivery of message {message_id:?} to {email}")]
    NotFound {
        message_id: Option<String>,
        email: String,
    },
    #[error(transparent)]
    MalformedTimestamp(#[from] MalformedTimestamp),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for BounceError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            BounceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            BounceError::MalformedTimestamp(_) => (StatusCode::BAD_REQUEST, "invalid_timestamp"),
            BounceError::Store(e) => {
                error!(error = %e, "bounce_store_failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };

        (
            status,
            Json(WebhookResponse {
                status: label,
                error: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}

/// Bounce webhook endpoint.
///
/// Links the bounce to the delivery of `MessageID` to `Email`. Repeated
/// deliveries of the same bounce `ID` leave the first record untouched.
pub async fn bounce_webhook(
    State(state): State<AppState>,
    Json(payload): Json<BouncePayload>,
) -> Result<Json<WebhookResponse>, BounceError> {
    info!(
        bounce_id = payload.id,
        bounce_type = payload.bounce_type.label(),
        message_id = ?payload.message_id,
        email = %payload.email,
        "bounce_webhook_received"
    );

    let bounced_at = parse_provider_timestamp(&payload.bounced_at).map_err(|e| {
        warn!(bounce_id = payload.id, error = %e, "bounce_timestamp_invalid");
        e
    })?;

    let delivery = match payload.message_id.as_deref() {
        Some(message_id) => state.store.find_delivery(message_id, &payload.email).await?,
        None => None,
    };

    let Some(delivery) = delivery else {
        warn!(
            bounce_id = payload.id,
            message_id = ?payload.message_id,
            email = %payload.email,
            "bounce_delivery_not_found"
        );
        return Err(BounceError::NotFound {
            message_id: payload.message_id,
            email: payload.email,
        });
    };

    let (bounce, created) = state
        .store
        .get_or_create_bounce(BounceRecord {
            bounce_id: payload.id,
            delivery_id: delivery.id,
            bounce_type: payload.bounce_type,
            description: payload.description.unwrap_or_default(),
            details: payload.details.unwrap_or_default(),
            bounced_at,
            inactive: payload.inactive,
            can_activate: payload.can_activate,
        })
        .await?;

    info!(
        bounce_id = bounce.bounce_id,
        delivery_id = bounce.delivery_id,
        created = created,
        "bounce_recorded"
    );

    Ok(Json(WebhookResponse {
        status: "ok",
        error: None,
    }))
}

// =============================================================================
// Delivery Listing
// =============================================================================

/// A delivery record together with its bounces.
#[derive(Debug, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub delivery: DeliveryRecord,
    pub bounces: Vec<BounceRecord>,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        error!(error = %self, "store_query_failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookResponse {
                status: "storage_error",
                error: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}

/// List delivery records, filtered by the query string.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<Vec<MessageView>>, StoreError> {
    let deliveries = state.store.search(&filter).await?;
    let mut views = Vec::with_capacity(deliveries.len());

    for delivery in deliveries {
        let bounces = state.store.bounces_for(delivery.id).await?;
        views.push(MessageView { delivery, bounces });
    }

    info!(results = views.len(), "messages_listed");

    Ok(Json(views))
}
