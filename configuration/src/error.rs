use thiserror::Error;

/// Errors raised while reading, validating or merging configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("Configuration merge error: {0}")]
    MergeError(String),

    #[error("Configuration serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration I/O error: {0}")]
    IoError(String),

    #[error("Configuration not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigurationError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}
