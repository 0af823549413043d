use thiserror::Error;

/// Failure of a single exchange with the chat service.
///
/// Cancellation is not represented here: an aborted stream settles silently.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response has no body")]
    MissingBody,

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
