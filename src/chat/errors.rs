//! Error types for the chat subsystem.

use thiserror::Error;

/// Chat subsystem error type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Neither text nor an attachment was supplied.
    #[error("message must contain text or an attachment")]
    EmptySubmission,
    /// No session exists for the identifier.
    #[error("unknown chat session: {0}")]
    UnknownSession(String),
}
