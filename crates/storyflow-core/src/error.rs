use thiserror::Error;

/// Core error type for the storyflow runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Story not found in the application's story map
    #[error("Story not found: {0}")]
    StoryNotFound(String),

    /// Line not found in a story tree
    #[error("Line not found: {0}")]
    LineNotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Service or command could not be resolved against the catalog
    #[error("Resolution error: {0}")]
    ResolutionError(String),

    /// A backing container failed to start
    #[error("Container start error: {0}")]
    ContainerStartError(String),

    /// Story execution error
    #[error("Story execution error: {0}")]
    StoryExecutionError(String),

    /// Subscription not registered
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Every attempt of an HTTP call failed at the transport level
    #[error("HTTP transport error: {0}")]
    HttpTransportError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Input/output error
    #[error("Input/output error: {0}")]
    IOError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::IOError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_error_display() {
        let errors = vec![
            (CoreError::StoryNotFound("a.story".to_string()), "Story not found: a.story"),
            (CoreError::LineNotFound("12".to_string()), "Line not found: 12"),
            (CoreError::ValidationError("invalid".to_string()), "Validation error: invalid"),
            (CoreError::ResolutionError("db.query".to_string()), "Resolution error: db.query"),
            (CoreError::ContainerStartError("db".to_string()), "Container start error: db"),
            (CoreError::StoryExecutionError("boom".to_string()), "Story execution error: boom"),
            (CoreError::SubscriptionNotFound("sub-1".to_string()), "Subscription not found: sub-1"),
            (CoreError::HttpTransportError("refused".to_string()), "HTTP transport error: refused"),
            (CoreError::ConfigurationError("port".to_string()), "Configuration error: port"),
            (CoreError::SerializationError("ser_err".to_string()), "Serialization error: ser_err"),
            (CoreError::IOError("io_err".to_string()), "Input/output error: io_err"),
            (CoreError::Other("other_err".to_string()), "other_err"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: CoreError = json_error.into();

        match error {
            CoreError::SerializationError(msg) => {
                assert!(msg.contains("expected value"));
            }
            _ => panic!("Expected SerializationError variant"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let error: CoreError = io_error.into();

        match error {
            CoreError::IOError(msg) => {
                assert!(msg.contains("file not found"));
            }
            _ => panic!("Expected IOError variant"),
        }
    }

    #[test]
    fn test_from_str() {
        let error: CoreError = "test error message".into();
        assert_eq!(error, CoreError::Other("test error message".to_string()));
    }
}
