use thiserror::Error;

use configuration::ConfigurationError;
use connection::SecurityError;
use identity::CanonError;

/// Failure of one authentication exchange or of gate setup.
///
/// Canonicalization and security errors fail the current attempt only; the
/// mechanism layer reports them to the client as an authentication failure.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Canonicalization failed: {0}")]
    Canon(#[from] CanonError),

    #[error("Security property error: {0}")]
    Security(#[from] SecurityError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, GateError>;
