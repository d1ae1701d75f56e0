//! Core authorization types for proxy authorization.
//!
//! # Security Considerations
//!
//! Proxy authorization lets one authenticated principal act as another for
//! the rest of a connection. Mistakes here are privilege escalation, so the
//! types below are deliberately small:
//!
//! ## 1. Identities
//! - Only canonical identities are ever compared; raw logins never reach
//!   this crate
//! - The anonymous principal can neither proxy nor be proxied to
//!
//! ## 2. Access classes
//! - Class definitions are read-only after load
//! - An unknown class has no members; it is not an error
//!
//! ## 3. Decisions
//! - Every decision carries a reason for the audit trail
//! - A decision is produced per request and never cached or retried
//! - `allowed` means "permitted to attempt": the downstream ACL check on the
//!   acting identity still has the final word

use identity::CanonicalIdentity;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// Name of a configured access class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessClassName(Cow<'static, str>);

impl AccessClassName {
    /// Members may act as any non-anonymous identity.
    pub const ADMINS: Self = Self(Cow::Borrowed("admins"));

    /// Trusted front-end servers relaying sessions on behalf of users.
    pub const PROXY_SERVERS: Self = Self(Cow::Borrowed("proxy_servers"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a proxy decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyReason {
    /// The principal asked to be itself
    SelfAuth,
    /// Allowed through the admins class
    Admin,
    /// Allowed through the proxy servers class
    ProxyServer,
    /// Anonymous sessions never act as someone else
    AnonymousAuth,
    /// Neither an admin nor a permitted proxy server
    NotAuthorized,
    /// Nobody may become the anonymous principal
    AnonymousTarget,
    /// The negotiated security strength is below the proxy minimum
    InsufficientSecurity,
}

impl ProxyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyReason::SelfAuth => "self_auth",
            ProxyReason::Admin => "admin",
            ProxyReason::ProxyServer => "proxy_server",
            ProxyReason::AnonymousAuth => "anonymous_auth",
            ProxyReason::NotAuthorized => "not_authorized",
            ProxyReason::AnonymousTarget => "anonymous_target",
            ProxyReason::InsufficientSecurity => "insufficient_security",
        }
    }
}

impl fmt::Display for ProxyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one proxy authorization request.
///
/// When `allowed` is false, `acting_as` is the authenticated identity: the
/// connection continues (if at all) as itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyDecision {
    pub allowed: bool,
    pub acting_as: CanonicalIdentity,
    pub reason: ProxyReason,
    /// The authenticated identity is in the admins class.
    /// Only evaluated for proxy requests, never for self-authentication.
    pub auth_is_admin: bool,
    /// The authenticated identity is a permitted proxy server.
    pub auth_is_proxy_admin: bool,
}

impl ProxyDecision {
    pub(crate) fn allow(acting_as: CanonicalIdentity, reason: ProxyReason) -> Self {
        Self {
            allowed: true,
            acting_as,
            reason,
            auth_is_admin: false,
            auth_is_proxy_admin: false,
        }
    }

    pub(crate) fn deny(auth_identity: CanonicalIdentity, reason: ProxyReason) -> Self {
        Self {
            allowed: false,
            acting_as: auth_identity,
            reason,
            auth_is_admin: false,
            auth_is_proxy_admin: false,
        }
    }

    pub(crate) fn with_class_flags(mut self, is_admin: bool, is_proxy_admin: bool) -> Self {
        self.auth_is_admin = is_admin;
        self.auth_is_proxy_admin = is_proxy_admin;
        self
    }
}
