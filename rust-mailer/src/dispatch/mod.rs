//! Batch dispatch to the Postmark API.
//!
//! ## Flow
//!
//! ```text
//! [OutgoingMessage] → translate_all() → chunks(batch_size) → POST /email/batch
//!                                                          → classify() → [SendOutcome]
//!                                                          → SentEvent per success
//! ```

pub mod client;
pub mod error;
pub mod response;

pub use client::{Dispatcher, SentEvent, SANDBOX_STATUS, SERVER_TOKEN_HEADER};
pub use error::DispatchError;
pub use response::{classify, SendOutcome, StatusClass};
