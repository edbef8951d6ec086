//! Persistent record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which recipient list an address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::To => "to",
            RecipientKind::Cc => "cc",
            RecipientKind::Bcc => "bcc",
        }
    }
}

/// Fields of a delivery record before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDelivery {
    pub message_id: String,
    pub submitted_at: DateTime<Utc>,
    pub status: String,
    pub to: String,
    pub to_type: RecipientKind,
    pub sender: String,
    pub reply_to: String,
    pub subject: String,
    pub tag: String,
    pub text_body: String,
    pub html_body: String,
    /// JSON array of `{Name, Value}`, empty when there were none
    pub headers: String,
    /// JSON array of `{Name, Content, ContentType}`, empty when there were none
    pub attachments: String,
}

/// One recipient of one successfully sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DeliveryRecord {
    pub id: i64,
    pub message_id: String,
    pub submitted_at: DateTime<Utc>,
    pub status: String,
    #[sqlx(rename = "recipient")]
    pub to: String,
    pub to_type: RecipientKind,
    pub sender: String,
    pub reply_to: String,
    pub subject: String,
    pub tag: String,
    pub text_body: String,
    pub html_body: String,
    pub headers: String,
    pub attachments: String,
}

/// Bounce categories reported by Postmark. Stored under their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum BounceType {
    HardBounce,
    Transient,
    Unsubscribe,
    Subscribe,
    AutoResponder,
    AddressChange,
    DnsError,
    SpamNotification,
    OpenRelayTest,
    SoftBounce,
    VirusNotification,
    ChallengeVerification,
    BadEmailAddress,
    SpamComplaint,
    ManuallyDeactivated,
    Unconfirmed,
    Blocked,
    #[serde(other)]
    Unknown,
}

impl BounceType {
    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            BounceType::HardBounce => "Hard Bounce",
            BounceType::Transient => "Transient",
            BounceType::Unsubscribe => "Unsubscribe",
            BounceType::Subscribe => "Subscribe",
            BounceType::AutoResponder => "AutoResponder",
            BounceType::AddressChange => "AddressChange",
            BounceType::DnsError => "DNS Error",
            BounceType::SpamNotification => "Spam Notification",
            BounceType::OpenRelayTest => "Open Relay Test",
            BounceType::SoftBounce => "Soft Bounce",
            BounceType::VirusNotification => "Virus Notification",
            BounceType::ChallengeVerification => "Challenge Verification",
            BounceType::BadEmailAddress => "Bad Email Address",
            BounceType::SpamComplaint => "Spam Complaint",
            BounceType::ManuallyDeactivated => "Manually Deactivated",
            BounceType::Unconfirmed => "Unconfirmed",
            BounceType::Blocked => "Blocked",
            BounceType::Unknown => "Unknown",
        }
    }
}

/// A bounce linked to the delivery it refers to. `bounce_id` is Postmark's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct BounceRecord {
    pub bounce_id: i64,
    pub delivery_id: i64,
    #[serde(rename = "type")]
    pub bounce_type: BounceType,
    pub description: String,
    pub details: String,
    pub bounced_at: DateTime<Utc>,
    pub inactive: bool,
    pub can_activate: bool,
}

/// Criteria for listing delivery records. Absent fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    /// Substring of message id, recipient or subject
    pub q: Option<String>,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub to_type: Option<RecipientKind>,
}
