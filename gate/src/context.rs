//! State owned by a single client connection.

use authz::{ProxyDecision, ProxyPolicy};
use configuration::GateConfig;
use connection::{ConnectionSecurityProperties, SessionId, TlsFacts, TlsSession};
use identity::{CanonicalIdentity, Canonicalizer};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn, Level};

use crate::callback::{CallbackResponse, CanonPhase, MechCallback};
use crate::error::Result;

/// Everything one connection knows about its security and identity.
///
/// Holds the configuration snapshot taken when the connection opened, so a
/// configuration publish never changes the rules mid-connection. Dropped when
/// the connection closes.
pub struct ConnectionContext {
    config: Arc<GateConfig>,
    canon: Canonicalizer,
    policy: Arc<ProxyPolicy>,
    security: ConnectionSecurityProperties,
    session_id: SessionId,
    endpoints: Option<(SocketAddr, SocketAddr)>,
    tls: Option<TlsFacts>,
    authenticated: Option<CanonicalIdentity>,
    acting_as: Option<CanonicalIdentity>,
    is_admin: bool,
    is_proxy_admin: bool,
}

impl ConnectionContext {
    pub(crate) fn new(
        config: Arc<GateConfig>,
        canon: Canonicalizer,
        policy: Arc<ProxyPolicy>,
        session_id: SessionId,
        endpoints: Option<(SocketAddr, SocketAddr)>,
    ) -> Self {
        let mut security = ConnectionSecurityProperties::new();
        if let Some((local, remote)) = endpoints {
            security.set_endpoints(local, remote);
        }
        Self {
            config,
            canon,
            policy,
            security,
            session_id,
            endpoints,
            tls: None,
            authenticated: None,
            acting_as: None,
            is_admin: false,
            is_proxy_admin: false,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn security(&self) -> &ConnectionSecurityProperties {
        &self.security
    }

    /// Address the client connected from.
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.endpoints.map(|(_, remote)| remote.ip())
    }

    /// The identity that authenticated.
    pub fn authenticated(&self) -> Option<&CanonicalIdentity> {
        self.authenticated.as_ref()
    }

    /// The identity the connection acts as after proxy authorization.
    pub fn acting_as(&self) -> Option<&CanonicalIdentity> {
        self.acting_as.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn is_proxy_admin(&self) -> bool {
        self.is_proxy_admin
    }

    /// Record TLS completion.
    pub fn start_tls(&mut self, session: &dyn TlsSession) -> Result<()> {
        self.tls = Some(self.security.set_tls(Some(session))?);
        Ok(())
    }

    /// Strength factor negotiated by the mechanism's own security layer.
    pub fn set_negotiated_ssf(&mut self, ssf: u32) {
        self.security.set_ssf(ssf);
    }

    /// Drop the current principal and its security context.
    ///
    /// Endpoints and the TLS session facts belong to the connection and are
    /// re-applied. The mechanism strength factor and any peer identity must
    /// be negotiated again.
    pub fn reauthenticate(&mut self) {
        debug!(session_id = %self.session_id, "Resetting security context for re-authentication");
        self.security.reset();
        if let Some((local, remote)) = self.endpoints {
            self.security.set_endpoints(local, remote);
        }
        if let Some(tls) = &self.tls {
            self.security.apply_tls(tls);
        }
        self.authenticated = None;
        self.acting_as = None;
        self.is_admin = false;
        self.is_proxy_admin = false;
    }

    /// Answer one mechanism-layer callback.
    pub fn dispatch(&mut self, callback: MechCallback<'_>) -> Result<CallbackResponse> {
        match callback {
            MechCallback::GetOpt { plugin, option } => Ok(CallbackResponse::Option(
                self.config
                    .sasl_option(plugin, option)
                    .map(str::to_string),
            )),
            MechCallback::CanonUser { phase, input, out } => {
                // An empty authorization id means "act as myself".
                if phase == CanonPhase::AuthzId && input.is_empty() {
                    return Ok(CallbackResponse::Canonical(0));
                }
                let written = self.canon.canonicalize_into(input, self.client_ip(), out)?;
                trace!(?phase, written, "Canonicalized login");
                Ok(CallbackResponse::Canonical(written))
            }
            MechCallback::ProxyPolicy { auth, requested } => self
                .authenticate(auth, Some(requested))
                .map(CallbackResponse::Decision),
            MechCallback::Log { level, message } => {
                self.log_mechanism(level, message);
                Ok(CallbackResponse::Logged)
            }
        }
    }

    /// Canonicalize both identities, authorize, and bind the result.
    ///
    /// A connection that is already authenticated is reset first.
    pub(crate) fn authenticate(
        &mut self,
        authn_raw: &[u8],
        authz_raw: Option<&[u8]>,
    ) -> Result<ProxyDecision> {
        if self.authenticated.is_some() {
            self.reauthenticate();
        }

        let client_ip = self.client_ip();
        let auth = self.canon.canonicalize(authn_raw, client_ip)?;
        let requested = match authz_raw {
            Some(raw) if !raw.is_empty() => self.canon.canonicalize(raw, client_ip)?,
            _ => auth.clone(),
        };

        let decision =
            self.policy
                .authorize_audited(&auth, &requested, &self.security, &self.session_id);
        if decision.allowed {
            self.complete_authentication(auth, &decision);
        }
        Ok(decision)
    }

    fn complete_authentication(&mut self, auth_identity: CanonicalIdentity, decision: &ProxyDecision) {
        self.security.bind_principal(&decision.acting_as);
        self.authenticated = Some(auth_identity);
        self.acting_as = Some(decision.acting_as.clone());
        self.is_admin = decision.auth_is_admin;
        self.is_proxy_admin = decision.auth_is_proxy_admin;
    }

    fn log_mechanism(&self, level: Level, message: &str) {
        let session_id = &self.session_id;
        match level {
            Level::ERROR => error!(%session_id, "{}", message),
            Level::WARN => warn!(%session_id, "{}", message),
            Level::INFO => info!(%session_id, "{}", message),
            Level::DEBUG => debug!(%session_id, "{}", message),
            _ => trace!(%session_id, "{}", message),
        }
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("session_id", &self.session_id)
            .field("security", &self.security)
            .field("authenticated", &self.authenticated)
            .field("acting_as", &self.acting_as)
            .finish_non_exhaustive()
    }
}
