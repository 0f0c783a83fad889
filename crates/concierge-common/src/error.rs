//! Concierge Common Error Types
//!
//! Centralized error handling for all Concierge components

use std::fmt;

/// Main error type for Concierge operations
#[derive(Debug)]
pub enum ConciergeError {
    /// Invalid settings or registry data, detected at construction
    Configuration(String),
    /// The language model could not produce a result
    ModelInvocation(String),
    /// The model answered, but not with the expected structured output
    OutputValidation(String),
    /// A tool offered to the model failed while executing
    ToolExecution(String),
    /// The requested capability is not available
    NotSupported(String),
    /// IO-related errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
}

impl ConciergeError {
    /// Configuration error naming the offending field
    pub fn invalid_field(field: &str, reason: impl fmt::Display) -> Self {
        ConciergeError::Configuration(format!("invalid value for `{}`: {}", field, reason))
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ConciergeError::Configuration(_) => "configuration_error",
            ConciergeError::ModelInvocation(_) => "model_invocation_error",
            ConciergeError::OutputValidation(_) => "output_validation_error",
            ConciergeError::ToolExecution(_) => "tool_execution_error",
            ConciergeError::NotSupported(_) => "not_supported",
            ConciergeError::Io(_) => "io_error",
            ConciergeError::Serde(_) => "serialization_error",
        }
    }
}

impl fmt::Display for ConciergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConciergeError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ConciergeError::ModelInvocation(msg) => write!(f, "Model invocation error: {}", msg),
            ConciergeError::OutputValidation(msg) => write!(f, "Output validation error: {}", msg),
            ConciergeError::ToolExecution(msg) => write!(f, "Tool execution error: {}", msg),
            ConciergeError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            ConciergeError::Io(err) => write!(f, "IO error: {}", err),
            ConciergeError::Serde(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ConciergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConciergeError::Io(err) => Some(err),
            ConciergeError::Serde(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience result type for Concierge operations
pub type Result<T> = std::result::Result<T, ConciergeError>;

impl From<std::io::Error> for ConciergeError {
    fn from(err: std::io::Error) -> Self {
        ConciergeError::Io(err)
    }
}

impl From<serde_json::Error> for ConciergeError {
    fn from(err: serde_json::Error) -> Self {
        ConciergeError::Serde(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_names_the_field() {
        let err = ConciergeError::invalid_field("temperature", "1.5 is outside [0, 1]");
        assert_eq!(err.kind(), "configuration_error");
        assert!(err.to_string().contains("`temperature`"));
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_from_conversions() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(ConciergeError::from(io), ConciergeError::Io(_)));

        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ConciergeError::from(serde_err);
        assert_eq!(err.kind(), "serialization_error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
