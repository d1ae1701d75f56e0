use thiserror::Error;

/// Misuse of the connection security-property API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// TLS facts were requested before a TLS session exists.
    #[error("no active TLS session")]
    NoActiveSession,

    #[error("TLS Finished message is {len} bytes, limit is {max}")]
    FinishedTooLong { len: usize, max: usize },
}

/// A session id or upstream fragment that cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed session id: {0}")]
    Malformed(String),
}
