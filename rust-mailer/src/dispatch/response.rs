//! Classification of provider responses into per-message outcomes.
//!
//! | Status | raised                  | fail-silently                      |
//! |--------|-------------------------|------------------------------------|
//! | 200    | -                       | -                                  |
//! | 401    | `Unauthorized`          | `{ErrorCode: 0, HttpStatus: 401}`  |
//! | 422    | `UnprocessableEntity`   | body + `HttpStatus: 422`           |
//! | other  | `ProviderServerError`   | `{ErrorCode: 0, HttpStatus: n}`    |
//!
//! Whatever happens, a returned list holds exactly one outcome per
//! submitted message.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::DispatchError;

/// Result of submitting one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendOutcome {
    /// Provider error code, 0 on success
    #[serde(default)]
    pub error_code: i64,
    /// HTTP status of the batch call that carried the message
    #[serde(default)]
    pub http_status: u16,
    #[serde(default, rename = "MessageID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Human readable status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Provider timestamp, see [`crate::timestamp`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl SendOutcome {
    /// Outcome carrying only a code and a status.
    pub fn synthetic(error_code: i64, http_status: u16) -> Self {
        Self {
            error_code,
            http_status,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code == 0 && self.http_status == 200
    }
}

/// How a batch response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Accepted,
    Unauthorized,
    Unprocessable,
    ServerError,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => StatusClass::Accepted,
            401 => StatusClass::Unauthorized,
            422 => StatusClass::Unprocessable,
            _ => StatusClass::ServerError,
        }
    }
}

/// Error body Postmark sends with non-200 responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderErrorBody {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
}

/// Turn a batch response into one outcome per submitted message.
pub fn classify(
    status: u16,
    body: &[u8],
    batch_len: usize,
    fail_silently: bool,
) -> Result<Vec<SendOutcome>, DispatchError> {
    match StatusClass::from_status(status) {
        StatusClass::Accepted => parse_accepted(body, batch_len),
        StatusClass::Unauthorized => {
            warn!(http_status = status, fail_silently = fail_silently, "provider_unauthorized");
            if fail_silently {
                Ok(vec![SendOutcome::synthetic(0, status); batch_len])
            } else {
                Err(DispatchError::Unauthorized)
            }
        }
        StatusClass::Unprocessable => {
            let error = parse_error_body(body);
            warn!(
                http_status = status,
                error_code = error.error_code,
                message = %error.message,
                fail_silently = fail_silently,
                "provider_unprocessable_entity"
            );
            if fail_silently {
                let outcome = SendOutcome {
                    error_code: error.error_code,
                    http_status: status,
                    message: Some(error.message),
                    ..Default::default()
                };
                Ok(vec![outcome; batch_len])
            } else {
                Err(DispatchError::UnprocessableEntity(error.message))
            }
        }
        StatusClass::ServerError => {
            warn!(
                http_status = status,
                body_preview = %String::from_utf8_lossy(&body[..body.len().min(200)]),
                fail_silently = fail_silently,
                "provider_server_error"
            );
            if fail_silently {
                Ok(vec![SendOutcome::synthetic(0, status); batch_len])
            } else {
                Err(DispatchError::ProviderServerError { status })
            }
        }
    }
}

fn parse_accepted(body: &[u8], batch_len: usize) -> Result<Vec<SendOutcome>, DispatchError> {
    let mut outcomes: Vec<SendOutcome> = serde_json::from_slice(body)
        .map_err(|e| DispatchError::MalformedResponse(e.to_string()))?;

    if outcomes.len() != batch_len {
        return Err(DispatchError::MalformedResponse(format!(
            "expected {} results, got {}",
            batch_len,
            outcomes.len()
        )));
    }

    for outcome in &mut outcomes {
        outcome.http_status = 200;
    }

    info!(
        results = outcomes.len(),
        errors = outcomes.iter().filter(|o| o.error_code != 0).count(),
        "provider_batch_accepted"
    );

    Ok(outcomes)
}

/// Read `ErrorCode` and `Message` from an error body, falling back to the raw
/// text when the body is not the expected JSON.
fn parse_error_body(body: &[u8]) -> ProviderErrorBody {
    serde_json::from_slice(body).unwrap_or_else(|_| ProviderErrorBody {
        error_code: 0,
        message: String::from_utf8_lossy(body).trim().to_string(),
    })
}
