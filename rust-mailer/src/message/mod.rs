//! Outgoing messages and their translation into the Postmark wire schema.
//!
//! ```text
//! OutgoingMessage → translate() → TranslatedMessage
//! ```

pub mod translate;
pub mod types;

pub use translate::{translate, translate_all, TranslationError};
pub use types::{Alternative, Attachment, Header, OutgoingMessage, TranslatedMessage};
