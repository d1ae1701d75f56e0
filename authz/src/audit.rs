//! Audit trail for proxy decisions.
//!
//! Decisions are emitted as structured events on the `audit` target so the
//! log pipeline can route them separately from operational logs. Only
//! canonical identities and the session id are recorded.

use connection::SessionId;
use identity::CanonicalIdentity;
use tracing::{info, warn};

use crate::types::ProxyDecision;

pub const AUDIT_TARGET: &str = "audit";

pub fn record_decision(
    session_id: &SessionId,
    auth_identity: &CanonicalIdentity,
    decision: &ProxyDecision,
) {
    if decision.allowed {
        info!(
            target: AUDIT_TARGET,
            session_id = %session_id,
            auth_identity = %auth_identity,
            acting_as = %decision.acting_as,
            allowed = true,
            reason = %decision.reason,
            "proxy authorization"
        );
    } else {
        warn!(
            target: AUDIT_TARGET,
            session_id = %session_id,
            auth_identity = %auth_identity,
            acting_as = %decision.acting_as,
            allowed = false,
            reason = %decision.reason,
            "proxy authorization"
        );
    }
}
