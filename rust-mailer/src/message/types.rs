//! Message types on both sides of the translator.
//!
//! - [`OutgoingMessage`]: what application code builds
//! - [`TranslatedMessage`]: one entry of the Postmark batch request body

use serde::{Deserialize, Serialize};

/// Mime type of the alternative part that becomes `HtmlBody`.
pub const HTML_MIME_TYPE: &str = "text/html";

/// Header promoted to the `ReplyTo` field.
pub const REPLY_TO_HEADER: &str = "Reply-To";

/// Header promoted to the `Tag` field.
pub const TAG_HEADER: &str = "Tag";

// =============================================================================
// Application Side
// =============================================================================

/// File attached to a message. `content` is already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "ContentType")]
    pub content_type: String,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// Alternative body part, e.g. the HTML rendering of the text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub content: String,
    pub mime_type: String,
}

/// Email message as built by application code.
///
/// `Reply-To` and `Tag` travel as ordinary headers and are promoted to
/// dedicated fields during translation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Sender address
    pub from: String,
    /// Primary recipients, at least one
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub subject: String,
    /// Plain-text body
    #[serde(default)]
    pub body: String,
    /// Alternative parts in insertion order
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    /// Custom headers as ordered (name, value) pairs
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Attach an HTML alternative.
    pub fn html(self, content: impl Into<String>) -> Self {
        self.alternative(content, HTML_MIME_TYPE)
    }

    pub fn alternative(mut self, content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.alternatives.push(Alternative {
            content: content.into(),
            mime_type: mime_type.into(),
        });
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn reply_to(self, address: impl Into<String>) -> Self {
        self.header(REPLY_TO_HEADER, address)
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.header(TAG_HEADER, tag)
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

// =============================================================================
// Wire Side
// =============================================================================

/// Custom header entry in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// One message of a Postmark batch request.
///
/// Optional fields that are absent are left out of the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslatedMessage {
    pub from: String,
    /// Comma-separated primary recipients
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    pub text_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}
