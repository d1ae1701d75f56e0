//! Callbacks the mechanism-negotiation layer calls back into.

use authz::ProxyDecision;
use tracing::Level;

/// Which identity a canonicalization request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonPhase {
    /// The identity whose credentials were verified
    AuthId,
    /// The identity the client asked to act as
    AuthzId,
}

/// One callback invocation from the mechanism layer.
#[derive(Debug)]
pub enum MechCallback<'a> {
    /// Read a mechanism option, plugin-scoped first.
    GetOpt {
        plugin: Option<&'a str>,
        option: &'a str,
    },
    /// Canonicalize a login into a bounded output buffer.
    CanonUser {
        phase: CanonPhase,
        input: &'a [u8],
        out: &'a mut [u8],
    },
    /// Decide whether `auth` may act as `requested`.
    ProxyPolicy {
        auth: &'a [u8],
        requested: &'a [u8],
    },
    /// Forward a mechanism log line.
    Log { level: Level, message: &'a str },
}

/// Result of a dispatched callback, one variant per callback kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResponse {
    Option(Option<String>),
    /// Bytes written to the caller's buffer
    Canonical(usize),
    Decision(ProxyDecision),
    Logged,
}
