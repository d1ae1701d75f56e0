//! Per-connection transport security facts.
//!
//! [`ConnectionSecurityProperties`] is filled in as TLS and mechanism
//! negotiation complete and read by the proxy policy. Whenever the
//! authenticated identity of a connection changes the properties must be
//! [`reset`](ConnectionSecurityProperties::reset) first; binding a second
//! principal to un-reset properties trips a debug assertion.

use identity::CanonicalIdentity;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::SocketAddr;

use crate::error::SecurityError;

/// Largest Finished message we keep (the biggest supported digest).
pub const MAX_FINISHED_LEN: usize = 64;

/// Channel binding type derived from the TLS Finished message.
pub const TLS_UNIQUE: &str = "tls-unique";

/// Facts the TLS layer exposes about an established session.
pub trait TlsSession {
    /// Negotiated symmetric cipher strength in bits.
    fn cipher_bits(&self) -> u32;

    /// Identity asserted by the peer certificate, if any.
    fn peer_identity(&self) -> Option<String>;

    /// The Finished message used for `tls-unique` channel binding.
    fn finished_message(&self) -> Option<Vec<u8>>;
}

/// TLS Finished message in a fixed-capacity buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct FinishedMessage {
    bytes: [u8; MAX_FINISHED_LEN],
    len: usize,
}

impl FinishedMessage {
    pub fn new(data: &[u8]) -> Result<Self, SecurityError> {
        if data.len() > MAX_FINISHED_LEN {
            return Err(SecurityError::FinishedTooLong {
                len: data.len(),
                max: MAX_FINISHED_LEN,
            });
        }
        let mut bytes = [0u8; MAX_FINISHED_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            bytes,
            len: data.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Debug for FinishedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishedMessage")
            .field("len", &self.len)
            .finish()
    }
}

/// Opaque channel-binding material, compared for equality only.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub name: String,
    /// The mechanism must fail if it cannot use this binding
    pub critical: bool,
    data: Vec<u8>,
}

impl ChannelBinding {
    pub fn new(name: impl Into<String>, critical: bool, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            critical,
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Short hex digest, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.data);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for ChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBinding")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// What a TLS handshake established for the whole connection.
///
/// Unlike the peer identity these facts do not belong to a principal, so
/// they survive re-authentication on the same TLS session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFacts {
    cipher_bits: u32,
    finished: Option<FinishedMessage>,
}

impl TlsFacts {
    pub fn capture(session: &dyn TlsSession) -> Result<Self, SecurityError> {
        let finished = session
            .finished_message()
            .map(|data| FinishedMessage::new(&data))
            .transpose()?;
        Ok(Self {
            cipher_bits: session.cipher_bits(),
            finished,
        })
    }

    pub fn cipher_bits(&self) -> u32 {
        self.cipher_bits
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionSecurityProperties {
    local_addr_port: Option<String>,
    remote_addr_port: Option<String>,
    security_strength_factor: u32,
    auth_id: Option<String>,
    channel_binding: Option<ChannelBinding>,
    tls_finished: Option<FinishedMessage>,
    bound_principal: Option<CanonicalIdentity>,
}

/// `ip;port`, the form the mechanism layer expects.
fn addr_port(addr: SocketAddr) -> String {
    format!("{};{}", addr.ip(), addr.port())
}

impl ConnectionSecurityProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoints(&mut self, local: SocketAddr, remote: SocketAddr) {
        self.local_addr_port = Some(addr_port(local));
        self.remote_addr_port = Some(addr_port(remote));
    }

    pub fn set_ssf(&mut self, ssf: u32) {
        self.security_strength_factor = ssf;
    }

    pub fn set_auth_id(&mut self, auth_id: impl Into<String>) {
        self.auth_id = Some(auth_id.into());
    }

    /// Capture strength, peer identity and channel binding from TLS.
    ///
    /// Fails with [`SecurityError::NoActiveSession`] when called before TLS
    /// is up. Nothing is modified on failure. The returned [`TlsFacts`] can
    /// be re-applied after a [`reset`](Self::reset) while the same TLS
    /// session is still active.
    pub fn set_tls(&mut self, session: Option<&dyn TlsSession>) -> Result<TlsFacts, SecurityError> {
        let session = session.ok_or(SecurityError::NoActiveSession)?;
        let facts = TlsFacts::capture(session)?;

        self.apply_tls(&facts);
        if let Some(peer) = session.peer_identity() {
            self.auth_id = Some(peer);
        }
        Ok(facts)
    }

    /// Restore the transport facts of an established TLS session.
    pub fn apply_tls(&mut self, facts: &TlsFacts) {
        self.security_strength_factor = facts.cipher_bits;
        self.channel_binding = facts
            .finished
            .as_ref()
            .map(|f| ChannelBinding::new(TLS_UNIQUE, false, f.as_bytes().to_vec()));
        self.tls_finished = facts.finished.clone();

        tracing::debug!(
            ssf = self.security_strength_factor,
            channel_binding = self.channel_binding.as_ref().map(|cb| cb.fingerprint()),
            "Captured TLS security properties"
        );
    }

    /// Clear every field back to unset/zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record the principal these properties are being used for.
    pub fn bind_principal(&mut self, principal: &CanonicalIdentity) {
        if let Some(previous) = &self.bound_principal {
            debug_assert!(
                previous == principal,
                "security properties reused for a different principal without reset()"
            );
            if previous != principal {
                tracing::error!(
                    previous = %previous,
                    principal = %principal,
                    "Security properties reused for a different principal without reset"
                );
            }
        }
        self.bound_principal = Some(principal.clone());
    }

    pub fn local_addr_port(&self) -> Option<&str> {
        self.local_addr_port.as_deref()
    }

    pub fn remote_addr_port(&self) -> Option<&str> {
        self.remote_addr_port.as_deref()
    }

    pub fn security_strength_factor(&self) -> u32 {
        self.security_strength_factor
    }

    pub fn auth_id(&self) -> Option<&str> {
        self.auth_id.as_deref()
    }

    pub fn channel_binding(&self) -> Option<&ChannelBinding> {
        self.channel_binding.as_ref()
    }

    pub fn tls_finished(&self) -> Option<&[u8]> {
        self.tls_finished.as_ref().map(FinishedMessage::as_bytes)
    }

    pub fn bound_principal(&self) -> Option<&CanonicalIdentity> {
        self.bound_principal.as_ref()
    }

    pub fn channel_binding_matches(&self, data: &[u8]) -> bool {
        self.channel_binding
            .as_ref()
            .map_or(false, |cb| cb.data() == data)
    }

    pub fn is_pristine(&self) -> bool {
        self.local_addr_port.is_none()
            && self.remote_addr_port.is_none()
            && self.security_strength_factor == 0
            && self.auth_id.is_none()
            && self.channel_binding.is_none()
            && self.tls_finished.is_none()
            && self.bound_principal.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::GateConfig;
    use identity::Canonicalizer;
    use std::sync::Arc;

    struct FakeTls {
        bits: u32,
        peer: Option<String>,
        finished: Option<Vec<u8>>,
    }

    impl TlsSession for FakeTls {
        fn cipher_bits(&self) -> u32 {
            self.bits
        }

        fn peer_identity(&self) -> Option<String> {
            self.peer.clone()
        }

        fn finished_message(&self) -> Option<Vec<u8>> {
            self.finished.clone()
        }
    }

    fn identity(raw: &str) -> CanonicalIdentity {
        Canonicalizer::new(Arc::new(GateConfig::default()))
            .canonicalize(raw.as_bytes(), None)
            .unwrap()
    }

    /// TLS facts are captured and exposed as channel binding
    #[test]
    fn test_set_tls() {
        let tls = FakeTls {
            bits: 256,
            peer: Some("mx.example.net".to_string()),
            finished: Some(vec![7u8; 12]),
        };
        let mut props = ConnectionSecurityProperties::new();
        props.set_tls(Some(&tls)).unwrap();

        assert_eq!(props.security_strength_factor(), 256);
        assert_eq!(props.auth_id(), Some("mx.example.net"));
        assert_eq!(props.tls_finished(), Some(&[7u8; 12][..]));
        let cb = props.channel_binding().unwrap();
        assert_eq!(cb.name, TLS_UNIQUE);
        assert!(!cb.critical);
        assert!(props.channel_binding_matches(&[7u8; 12]));
        assert!(!props.channel_binding_matches(&[7u8; 11]));
    }

    /// Without a TLS session nothing is set
    #[test]
    fn test_set_tls_without_session() {
        let mut props = ConnectionSecurityProperties::new();
        assert_eq!(props.set_tls(None), Err(SecurityError::NoActiveSession));
        assert!(props.is_pristine());
    }

    /// An oversized Finished message is refused and leaves state untouched
    #[test]
    fn test_finished_too_long() {
        let tls = FakeTls {
            bits: 128,
            peer: None,
            finished: Some(vec![1u8; MAX_FINISHED_LEN + 1]),
        };
        let mut props = ConnectionSecurityProperties::new();
        assert_eq!(
            props.set_tls(Some(&tls)),
            Err(SecurityError::FinishedTooLong {
                len: MAX_FINISHED_LEN + 1,
                max: MAX_FINISHED_LEN
            })
        );
        assert_eq!(props.security_strength_factor(), 0);
    }

    /// Reset clears every field
    #[test]
    fn test_reset_clears_everything() {
        let mut props = ConnectionSecurityProperties::new();
        props.set_endpoints(
            "192.0.2.10:993".parse().unwrap(),
            "198.51.100.7:51234".parse().unwrap(),
        );
        props.set_ssf(56);
        props.set_auth_id("alice");
        props
            .set_tls(Some(&FakeTls {
                bits: 256,
                peer: None,
                finished: Some(vec![3u8; 32]),
            }))
            .unwrap();
        props.bind_principal(&identity("alice"));
        assert_eq!(props.local_addr_port(), Some("192.0.2.10;993"));
        assert_eq!(props.remote_addr_port(), Some("198.51.100.7;51234"));
        assert!(!props.is_pristine());

        props.reset();
        assert!(props.is_pristine());
        assert!(props.channel_binding().is_none());
        assert_eq!(props.security_strength_factor(), 0);
    }

    /// TLS facts come back after a reset but the peer identity does not
    #[test]
    fn test_apply_tls_after_reset() {
        let mut props = ConnectionSecurityProperties::new();
        let facts = props
            .set_tls(Some(&FakeTls {
                bits: 256,
                peer: Some("client.example.net".to_string()),
                finished: Some(vec![9u8; 12]),
            }))
            .unwrap();
        assert_eq!(facts.cipher_bits(), 256);
        props.bind_principal(&identity("alice"));

        props.reset();
        props.apply_tls(&facts);
        assert_eq!(props.security_strength_factor(), 256);
        assert!(props.channel_binding_matches(&[9u8; 12]));
        assert_eq!(props.tls_finished(), Some(&[9u8; 12][..]));
        assert!(props.auth_id().is_none());
        assert!(props.bound_principal().is_none());
    }

    /// Rebinding the same principal is fine; a new one after reset is fine
    #[test]
    fn test_bind_principal_after_reset() {
        let mut props = ConnectionSecurityProperties::new();
        props.bind_principal(&identity("alice"));
        props.bind_principal(&identity("ALICE"));
        props.reset();
        props.bind_principal(&identity("bob"));
        assert_eq!(props.bound_principal(), Some(&identity("bob")));
    }

    /// Switching principal without reset is caught
    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "without reset()")]
    fn test_bind_principal_without_reset_panics() {
        let mut props = ConnectionSecurityProperties::new();
        props.bind_principal(&identity("alice"));
        props.bind_principal(&identity("bob"));
    }

    /// Debug output never contains raw binding bytes
    #[test]
    fn test_channel_binding_debug_redacts() {
        let cb = ChannelBinding::new(TLS_UNIQUE, true, b"secret-bytes".to_vec());
        let debug = format!("{:?}", cb);
        assert!(debug.contains("fingerprint"));
        assert!(!debug.contains("115, 101, 99"));
        assert_eq!(cb.fingerprint().len(), 16);
    }
}
