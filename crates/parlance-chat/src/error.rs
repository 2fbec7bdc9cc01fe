//! Error types for the conversational core.

use parlance_core::error::ParlanceError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("turn must carry text or an attachment")]
    InvalidTurn,
    #[error("message cannot be empty")]
    EmptyInput,
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
    #[error("upstream error: {message}")]
    Upstream { message: String, retryable: bool },
    #[error("speech unavailable: {0}")]
    SpeechUnavailable(String),
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("attachment error: {0}")]
    Attachment(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Whether the caller may usefully resend the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Upstream { retryable: true, .. })
    }
}

impl From<ParlanceError> for ChatError {
    fn from(err: ParlanceError) -> Self {
        match err {
            ParlanceError::Upstream { message, retryable } => {
                ChatError::Upstream { message, retryable }
            }
            ParlanceError::Speech(msg) => ChatError::SpeechUnavailable(msg),
            ParlanceError::Attachment(msg) => ChatError::Attachment(msg),
            ParlanceError::Config(msg) => ChatError::Config(msg),
            ParlanceError::Serialization(msg) => ChatError::Serialization(msg),
            ParlanceError::Io(e) => ChatError::Io(e),
            other => ChatError::Other(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(err.to_string())
    }
}
