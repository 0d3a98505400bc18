//! Common error types and handling for Gigboard
//!
//! One taxonomy is shared by the repository client, the selection state and
//! the messaging facade. Repository errors travel unchanged up to the facade,
//! which records them per operation for the UI.

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

use crate::state::StateError;

/// Common error type for the Gigboard client core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Malformed or empty input, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure or client-side timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response (or `success: false` envelope) from the backend
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation referenced a conversation id that is not in the current list
    #[error("Selection error: unknown conversation {0}")]
    Selection(String),

    #[error("No active conversation selected")]
    NoActiveConversation,

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Get the error code surfaced to the UI layer
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::Server { .. } => "SERVER_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Selection(_) => "SELECTION_ERROR",
            Error::NoActiveConversation => "NO_ACTIVE_CONVERSATION",
            Error::State(_) => "STATE_ERROR",
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether offering the user a retry affordance makes sense
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
