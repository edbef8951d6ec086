//! Translation of application messages into the Postmark wire schema.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{info, warn};

use super::types::{
    Header, OutgoingMessage, TranslatedMessage, HTML_MIME_TYPE, REPLY_TO_HEADER, TAG_HEADER,
};

/// A message whose shape cannot be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("message has no sender")]
    MissingSender,
    #[error("message has no primary recipient")]
    MissingRecipient,
    #[error("{0} recipient list contains an empty address")]
    EmptyRecipient(&'static str),
    #[error("attachment {index} has no name")]
    UnnamedAttachment { index: usize },
    #[error("attachment {name:?} is not valid base64")]
    InvalidAttachment { name: String },
}

/// Translate one message into its wire form.
pub fn translate(message: &OutgoingMessage) -> Result<TranslatedMessage, TranslationError> {
    if message.from.trim().is_empty() {
        return Err(TranslationError::MissingSender);
    }
    if message.to.is_empty() {
        return Err(TranslationError::MissingRecipient);
    }

    let to = join_recipients("to", &message.to)?;
    let cc = optional_recipients("cc", &message.cc)?;
    let bcc = optional_recipients("bcc", &message.bcc)?;

    let html_body = message
        .alternatives
        .iter()
        .rev()
        .find(|alt| alt.mime_type == HTML_MIME_TYPE)
        .map(|alt| alt.content.clone());

    let mut reply_to = None;
    let mut tag = None;
    let mut headers = Vec::with_capacity(message.headers.len());

    for (name, value) in &message.headers {
        if name.eq_ignore_ascii_case(REPLY_TO_HEADER) {
            reply_to = Some(value.clone());
        } else if name.eq_ignore_ascii_case(TAG_HEADER) {
            tag = Some(value.clone());
        } else {
            headers.push(Header {
                name: name.clone(),
                value: value.clone(),
            });
        }
    }

    for (index, attachment) in message.attachments.iter().enumerate() {
        if attachment.name.trim().is_empty() {
            return Err(TranslationError::UnnamedAttachment { index });
        }
        if STANDARD.decode(attachment.content.trim()).is_err() {
            return Err(TranslationError::InvalidAttachment {
                name: attachment.name.clone(),
            });
        }
    }

    Ok(TranslatedMessage {
        from: message.from.clone(),
        to,
        cc,
        bcc,
        subject: message.subject.clone(),
        tag,
        html_body,
        text_body: message.body.clone(),
        reply_to,
        headers,
        attachments: message.attachments.clone(),
    })
}

/// Translate a list of messages, applying the fail-silently policy.
///
/// With `fail_silently` set, messages that fail translation are logged and
/// dropped. Otherwise the first failure is returned.
pub fn translate_all(
    messages: &[OutgoingMessage],
    fail_silently: bool,
) -> Result<Vec<TranslatedMessage>, TranslationError> {
    let mut translated = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        match translate(message) {
            Ok(t) => translated.push(t),
            Err(e) if fail_silently => {
                warn!(
                    index = index,
                    from = %message.from,
                    error = %e,
                    "message_translation_skipped"
                );
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        submitted = messages.len(),
        translated = translated.len(),
        "message_translation_complete"
    );

    Ok(translated)
}

fn join_recipients(kind: &'static str, recipients: &[String]) -> Result<String, TranslationError> {
    if recipients.iter().any(|r| r.trim().is_empty()) {
        return Err(TranslationError::EmptyRecipient(kind));
    }
    Ok(recipients.join(","))
}

fn optional_recipients(
    kind: &'static str,
    recipients: &[String],
) -> Result<Option<String>, TranslationError> {
    if recipients.is_empty() {
        return Ok(None);
    }
    join_recipients(kind, recipients).map(Some)
}
