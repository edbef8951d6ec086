//! Web server module.
//!
//! Exposes the dispatcher over HTTP and receives Postmark bounce webhooks.
//! Routes registered with a single method answer anything else with 405.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    bounce_webhook, health, list_messages, send_messages, AppState, BounceError, BouncePayload,
    HealthResponse, MessageView, SendResponse, WebhookResponse,
};

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/send", post(send_messages))
        .route("/bounce", post(bounce_webhook))
        .route("/messages", get(list_messages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
