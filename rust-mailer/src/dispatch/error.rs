//! Errors surfaced by the batch dispatcher.

use thiserror::Error;

use crate::message::TranslationError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// A message could not be translated and fail-silently is off.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// HTTP 401: the server token was rejected.
    #[error("provider rejected the server token")]
    Unauthorized,

    /// HTTP 422: the provider refused the request, with its explanation.
    #[error("provider rejected the request: {0}")]
    UnprocessableEntity(String),

    /// HTTP 500 or any status without a dedicated mapping.
    #[error("provider returned HTTP {status}")]
    ProviderServerError { status: u16 },

    /// A 200 response whose body does not line up with the submitted batch.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The provider did not answer within the configured timeout.
    #[error("provider request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("provider request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl DispatchError {
    /// Whether a later attempt with the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Timeout(_)
                | DispatchError::Transport(_)
                | DispatchError::ProviderServerError { .. }
        )
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Timeout(e)
        } else {
            DispatchError::Transport(e)
        }
    }
}
