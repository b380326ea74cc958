//! Structured errors for the core library. The CLI binary wraps these in
//! `anyhow`; library consumers match on the variants.

use std::io;
use thiserror::Error;

/// Main error type for chatarc-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Zip archive assembly failed
    #[error("archive error: {source}")]
    Archive {
        #[from]
        source: zip::result::ZipError,
    },

    /// Export format string not recognized
    #[error("unsupported export format '{format}'")]
    UnsupportedFormat { format: String },

    /// Required field missing
    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// Configuration error
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for chatarc-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::unsupported_format("yaml");
        assert_eq!(err.to_string(), "unsupported export format 'yaml'");

        let err = CoreError::missing_field("mapping", "conversation detail");
        assert!(err.to_string().contains("mapping"));
        assert!(err.to_string().contains("conversation detail"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();

        assert!(matches!(core_err, CoreError::Io { .. }));
    }
}
