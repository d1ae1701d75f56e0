use configuration::GateConfig;
use connection::{ConnectionSecurityProperties, SessionId};
use identity::CanonicalIdentity;
use std::sync::Arc;
use tracing::debug;

use crate::audit;
use crate::classes::AccessClasses;
use crate::types::{AccessClassName, ProxyDecision, ProxyReason};

/// Decides whether an authenticated principal may act as another.
///
/// # Evaluation order
///
/// 1. Same canonical identity: allowed (`SelfAuth`), no class lookup
/// 2. Anonymous authenticated identity: denied (`AnonymousAuth`)
/// 3. Neither admin nor permitted proxy server: denied (`NotAuthorized`)
/// 4. Anonymous requested identity: denied (`AnonymousTarget`)
/// 5. Security strength below the proxy minimum: denied (`InsufficientSecurity`)
///
/// Anonymous acting as anonymous stops at step 1 and is allowed.
pub struct ProxyPolicy {
    classes: Arc<AccessClasses>,
    allow_proxy_servers: bool,
    min_ssf: u32,
}

impl ProxyPolicy {
    /// Policy with the proxy servers class honoured.
    pub fn new(classes: Arc<AccessClasses>, config: &GateConfig) -> Self {
        Self {
            classes,
            allow_proxy_servers: true,
            min_ssf: config.proxy_min_ssf,
        }
    }

    /// Services that must not accept relayed sessions switch this off.
    pub fn with_proxy_servers(mut self, allow: bool) -> Self {
        self.allow_proxy_servers = allow;
        self
    }

    pub fn classes(&self) -> &AccessClasses {
        &self.classes
    }

    pub fn authorize(
        &self,
        auth_identity: &CanonicalIdentity,
        requested_identity: &CanonicalIdentity,
        security: &ConnectionSecurityProperties,
    ) -> ProxyDecision {
        if auth_identity == requested_identity {
            return ProxyDecision::allow(requested_identity.clone(), ProxyReason::SelfAuth);
        }

        if auth_identity.is_anonymous() {
            return ProxyDecision::deny(auth_identity.clone(), ProxyReason::AnonymousAuth);
        }

        let is_admin = self
            .classes
            .is_member(auth_identity, &AccessClassName::ADMINS);
        let is_proxy_admin = self.allow_proxy_servers
            && self
                .classes
                .is_member(auth_identity, &AccessClassName::PROXY_SERVERS);
        let deny = |reason| {
            ProxyDecision::deny(auth_identity.clone(), reason)
                .with_class_flags(is_admin, is_proxy_admin)
        };

        if !is_admin && !is_proxy_admin {
            return deny(ProxyReason::NotAuthorized);
        }

        if requested_identity.is_anonymous() {
            return deny(ProxyReason::AnonymousTarget);
        }

        let ssf = security.security_strength_factor();
        if ssf < self.min_ssf {
            debug!(ssf, min_ssf = self.min_ssf, "Proxy request over insufficient security layer");
            return deny(ProxyReason::InsufficientSecurity);
        }

        let reason = if is_admin {
            ProxyReason::Admin
        } else {
            ProxyReason::ProxyServer
        };
        ProxyDecision::allow(requested_identity.clone(), reason)
            .with_class_flags(is_admin, is_proxy_admin)
    }

    /// [`authorize`](Self::authorize), then record the decision on the audit
    /// target tagged with the session id.
    pub fn authorize_audited(
        &self,
        auth_identity: &CanonicalIdentity,
        requested_identity: &CanonicalIdentity,
        security: &ConnectionSecurityProperties,
        session_id: &SessionId,
    ) -> ProxyDecision {
        let decision = self.authorize(auth_identity, requested_identity, security);
        audit::record_decision(session_id, auth_identity, &decision);
        decision
    }
}
