//! Proxy authorization for the mailgate authentication gate.
//!
//! This crate answers one question per authentication exchange: may the
//! authenticated principal act as the identity it requested?
//!
//! # Architecture Overview
//!
//! 1. **Canonicalization** (`identity` crate) turns both logins into
//!    canonical identities
//! 2. **AccessClasses** resolves membership in configured classes such as
//!    `admins` and `proxy_servers`
//! 3. **ProxyPolicy** combines membership with the connection's security
//!    properties into a [`ProxyDecision`]
//! 4. **Audit** records every decision with the session id
//!
//! A positive decision only means the principal may *attempt* to act as the
//! requested identity. Mailbox ACLs downstream still apply to the acting
//! identity.

pub mod audit;
pub mod classes;
pub mod error;
pub mod policy;
pub mod types;

pub use audit::AUDIT_TARGET;
pub use classes::{AccessClasses, ClassEntry, GroupDirectory, NoGroups, StaticGroups};
pub use error::{AuthzError, Result};
pub use policy::ProxyPolicy;
pub use types::{AccessClassName, ProxyDecision, ProxyReason};
