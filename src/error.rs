use thiserror::Error;

use crate::services::reconciler::MutationId;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Login or signup credentials were rejected. The session is untouched.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The server rejected the credential of an active session.
    #[error("Session expired")]
    AuthExpired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Change {0} was not confirmed by the server in time, please retry")]
    MutationTimeout(MutationId),

    #[error("A change to {0} is still pending")]
    MutationInFlight(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Errors a poll can shrug off and retry on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Server { .. })
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ClientError::AuthExpired)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
