use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while creating a handle or looking up weather.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("credential '{credential}' is already in use by a live handle")]
    CredentialOccupied { credential: String },

    #[error("credential must not be empty")]
    EmptyCredential,

    #[error("the API considers '{credential}' an invalid key")]
    InvalidCredential { credential: String },

    #[error("unexpected status {status} for request '{request}'")]
    UnexpectedStatus { status: StatusCode, request: String },

    #[error("city '{city}' is not found")]
    LocationNotFound { city: String },

    #[error("attempt to use a disposed weather handle")]
    Disposed,

    #[error("a polling handle needs a running Tokio runtime")]
    NoRuntime,

    #[error("failed to process {context} JSON")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to send request '{request}'")]
    Transport {
        request: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl HandleError {
    /// Errors the remote service reported, as opposed to local failures.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            HandleError::InvalidCredential { .. }
                | HandleError::UnexpectedStatus { .. }
                | HandleError::LocationNotFound { .. }
        )
    }
}
