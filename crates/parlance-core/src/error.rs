use thiserror::Error;

/// Top-level error type shared by the Parlance service crates.
///
/// Service crates (completion, speech) report failures through this type so
/// that the chat layer can map them onto its own taxonomy in one place.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParlanceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Upstream error: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("Speech error: {0}")]
    Speech(String),
}

impl ParlanceError {
    /// Build an upstream failure.
    pub fn upstream(message: impl Into<String>, retryable: bool) -> Self {
        ParlanceError::Upstream {
            message: message.into(),
            retryable,
        }
    }

    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ParlanceError::Upstream { retryable: true, .. })
    }
}

impl From<toml::de::Error> for ParlanceError {
    fn from(err: toml::de::Error) -> Self {
        ParlanceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ParlanceError {
    fn from(err: toml::ser::Error) -> Self {
        ParlanceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ParlanceError {
    fn from(err: serde_json::Error) -> Self {
        ParlanceError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Parlance operations.
pub type Result<T> = std::result::Result<T, ParlanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParlanceError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = ParlanceError::upstream("quota exhausted", true);
        assert_eq!(err.to_string(), "Upstream error: quota exhausted");

        let err = ParlanceError::Speech("no network".to_string());
        assert_eq!(err.to_string(), "Speech error: no network");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ParlanceError = io_err.into();
        assert!(matches!(err, ParlanceError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: ParlanceError = toml_err.into();
        assert!(matches!(err, ParlanceError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ParlanceError = json_err.into();
        assert!(matches!(err, ParlanceError::Serialization(_)));
    }

    #[test]
    fn test_retryable_only_for_retryable_upstream() {
        assert!(ParlanceError::upstream("503", true).is_retryable());
        assert!(!ParlanceError::upstream("400", false).is_retryable());
        assert!(!ParlanceError::Speech("x".into()).is_retryable());
        assert!(!ParlanceError::Config("x".into()).is_retryable());
    }
}
