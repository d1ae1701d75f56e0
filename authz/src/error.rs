//! Error types for the authorization system.
//!
//! # Security Note
//! None of these errors ever reaches a client. A membership question that
//! runs into one of them is answered "not a member"; the detail is logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    /// An access-class or group entry in configuration cannot be used.
    ///
    /// The entry is skipped at load time.
    #[error("Invalid access class entry '{entry}': {reason}")]
    InvalidClassEntry { entry: String, reason: String },

    /// The group directory could not answer.
    #[error("Group directory lookup failed: {0}")]
    Directory(String),
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
