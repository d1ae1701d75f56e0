//! Authentication gate for mail protocol services.
//!
//! [`Gate`] is built once per configuration snapshot and shared by every
//! connection. Each accepted connection gets a [`ConnectionContext`] that
//! carries its security properties, session id and, once the exchange
//! succeeds, the principal it acts as.
//!
//! ```text
//! accept ──► Gate::open_connection ──► ConnectionContext
//!                                         │  start_tls / set_negotiated_ssf
//!                                         ▼
//!            Gate::authenticate  or  ConnectionContext::dispatch(MechCallback)
//!                                         │
//!                      canonicalize ──► authorize ──► bind principal
//! ```

pub mod callback;
pub mod context;
pub mod error;
pub mod logging;

pub use callback::{CallbackResponse, CanonPhase, MechCallback};
pub use context::ConnectionContext;
pub use error::{GateError, Result};
pub use logging::{init_logging, LoggingGuard};

use authz::{AccessClasses, ProxyDecision, ProxyPolicy};
use configuration::{ConfigHandle, GateConfig};
use connection::SessionIdGenerator;
use identity::Canonicalizer;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared canonicalizer, access classes and policy for one config snapshot.
pub struct Gate {
    config: Arc<GateConfig>,
    canon: Canonicalizer,
    classes: Arc<AccessClasses>,
    policy: Arc<ProxyPolicy>,
    session_ids: SessionIdGenerator,
}

impl Gate {
    /// Build every component from configuration.
    pub fn new(config: Arc<GateConfig>) -> Self {
        let canon = Canonicalizer::new(Arc::clone(&config));
        let classes = Arc::new(AccessClasses::from_config(&config, &canon));
        Self::with_parts(config, canon, classes)
    }

    /// Build from the snapshot currently published on `handle`.
    pub fn from_handle(handle: &ConfigHandle) -> Self {
        Self::new(handle.current())
    }

    /// Assemble from externally built parts, e.g. a directory-backed
    /// domain mapper or group directory.
    pub fn with_parts(
        config: Arc<GateConfig>,
        canon: Canonicalizer,
        classes: Arc<AccessClasses>,
    ) -> Self {
        let policy = Arc::new(ProxyPolicy::new(Arc::clone(&classes), &config));
        let session_ids = SessionIdGenerator::from_config(&config);
        info!(
            server_name = %config.server_name,
            classes = classes.class_names().count(),
            "Authentication gate ready"
        );
        Self {
            config,
            canon,
            classes,
            policy,
            session_ids,
        }
    }

    /// For services that must not accept sessions relayed by proxy servers.
    pub fn without_proxy_servers(mut self) -> Self {
        self.policy = Arc::new(
            ProxyPolicy::new(Arc::clone(&self.classes), &self.config).with_proxy_servers(false),
        );
        self
    }

    pub fn config(&self) -> &Arc<GateConfig> {
        &self.config
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canon
    }

    pub fn classes(&self) -> &AccessClasses {
        &self.classes
    }

    pub fn policy(&self) -> &ProxyPolicy {
        &self.policy
    }

    pub fn session_ids(&self) -> &SessionIdGenerator {
        &self.session_ids
    }

    /// Start tracking a freshly accepted connection.
    ///
    /// `upstream_session` is the session id a front-end passed along; a
    /// malformed one is ignored and a fresh id is used.
    pub fn open_connection(
        &self,
        endpoints: Option<(SocketAddr, SocketAddr)>,
        upstream_session: Option<&str>,
    ) -> ConnectionContext {
        let session_id = self.session_ids.new_id(upstream_session);
        debug!(session_id = %session_id, remote = ?endpoints.map(|(_, r)| r), "Connection opened");
        ConnectionContext::new(
            Arc::clone(&self.config),
            self.canon.clone(),
            Arc::clone(&self.policy),
            session_id,
            endpoints,
        )
    }

    /// Run one authentication exchange on `ctx`.
    ///
    /// `authz_raw` is the identity the client asked to act as; `None` or
    /// empty means itself. On an allowed decision the acting identity is
    /// bound to the connection. A denied decision leaves the connection
    /// unauthenticated.
    pub fn authenticate(
        &self,
        authn_raw: &[u8],
        authz_raw: Option<&[u8]>,
        ctx: &mut ConnectionContext,
    ) -> Result<ProxyDecision> {
        ctx.authenticate(authn_raw, authz_raw)
    }
}
