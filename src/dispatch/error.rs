//! Error types for outbound dispatch.

use thiserror::Error;

/// Errors that end a single dispatch attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Network or HTTP client failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The collaborator answered with a non-success status.
    #[error("service returned status {0}")]
    Status(u16),

    /// The attached image could not be decoded or re-encoded.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// The collaborator answered 2xx with a body we cannot use.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Free chat was requested without a generative API key.
    #[error("generative API key is not configured")]
    MissingApiKey,

    /// A markup pattern failed to compile.
    #[error("markup pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// The image worker panicked or was cancelled.
    #[error("image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl DispatchError {
    /// Short label for log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Image(_) => "image",
            Self::MalformedResponse(_) => "malformed_response",
            Self::MissingApiKey => "missing_api_key",
            Self::Pattern(_) => "pattern",
            Self::Worker(_) => "worker",
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Convenience result alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
