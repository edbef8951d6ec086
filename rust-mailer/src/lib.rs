//! Postmark mailer - batch dispatch with delivery records and bounce tracking.
//!
//! This library backs two binaries:
//! - `postmark-mailer`: web service for sending, bounce webhooks and record listing
//! - `postmark-send`: one-shot sender reading messages from stdin
//!
//! ## Architecture
//!
//! ```text
//! OutgoingMessage → translate → Dispatcher → POST /email/batch → classify
//!                                   │
//!                                   └─ SentEvent → recorder → Store ← POST /bounce
//! ```

pub mod config;
pub mod dispatch;
pub mod message;
pub mod recorder;
pub mod store;
pub mod timestamp;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use dispatch::{DispatchError, Dispatcher, SendOutcome, SentEvent};
pub use message::{Attachment, OutgoingMessage, TranslatedMessage, TranslationError};
pub use store::{BounceRecord, DeliveryRecord, Store, StoreError};
pub use timestamp::{parse_provider_timestamp, MalformedTimestamp};
pub use web::AppState;
