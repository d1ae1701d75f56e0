//! Per-connection state: transport security properties and the session
//! correlation id.
//!
//! Both are owned by exactly one connection and dropped with it.

pub mod error;
pub mod security;
pub mod session_id;

pub use error::{ParseError, SecurityError};
pub use security::{
    ChannelBinding, ConnectionSecurityProperties, FinishedMessage, TlsFacts, TlsSession,
    MAX_FINISHED_LEN, TLS_UNIQUE,
};
pub use session_id::{chain, validate_fragment, SessionId, SessionIdGenerator, MAX_SESSIONID_SIZE};
