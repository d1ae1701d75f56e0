//! Canonicalization failures.
//!
//! Every variant fails exactly one authentication attempt. None of them is
//! fatal to the process.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonError {
    /// Control characters, embedded whitespace, invalid UTF-8, a repeated
    /// domain separator or a malformed domain.
    #[error("login contains invalid characters")]
    InvalidCharacters,

    #[error("login is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("login is empty")]
    Empty,

    #[error("login has an empty domain")]
    EmptyDomain,

    /// Identifiers reserved for access-control entries.
    #[error("'{0}' is reserved and cannot be used as a login")]
    Reserved(String),

    /// The caller's output buffer cannot hold the canonical form.
    #[error("canonical form needs {needed} bytes, buffer holds {capacity}")]
    OutputOverflow { needed: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, CanonError>;
