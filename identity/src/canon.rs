//! Login canonicalization.
//!
//! Input arrives as an explicitly sized byte buffer straight from the
//! mechanism layer. Nothing here assumes NUL termination: an embedded NUL is
//! just another control byte and is rejected.

use configuration::GateConfig;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CanonError, Result};
use crate::types::{CanonicalIdentity, ANONYMOUS_PRINCIPAL};
use crate::virtdomain::{DomainMapper, StaticDomainMap};

/// Names that only make sense inside access-control entries.
const RESERVED_NAMES: &[&str] = &["anyone", "anybody"];

/// Turns raw logins into [`CanonicalIdentity`] values.
///
/// Pure apart from the virtual-domain lookup, which reads the configured map
/// (or an injected [`DomainMapper`]).
#[derive(Clone)]
pub struct Canonicalizer {
    config: Arc<GateConfig>,
    mapper: Arc<dyn DomainMapper>,
}

impl Canonicalizer {
    /// Canonicalizer using the configured static virtual-domain map.
    pub fn new(config: Arc<GateConfig>) -> Self {
        let mapper = Arc::new(StaticDomainMap::from_rules(&config.virtual_domain_map));
        Self { config, mapper }
    }

    pub fn with_mapper(config: Arc<GateConfig>, mapper: Arc<dyn DomainMapper>) -> Self {
        Self { config, mapper }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn canonicalize(&self, raw: &[u8], client_ip: Option<IpAddr>) -> Result<CanonicalIdentity> {
        let max = self.config.max_login_length;
        if raw.len() > max {
            return Err(CanonError::TooLong { len: raw.len(), max });
        }

        let text = std::str::from_utf8(raw).map_err(|_| CanonError::InvalidCharacters)?;
        let login = text.trim_end_matches([' ', '\t']);
        if login.is_empty() {
            return Err(CanonError::Empty);
        }
        if login.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(CanonError::InvalidCharacters);
        }

        let separator = self.config.domain_separator;
        let mut parts = login.split(separator);
        let local = parts.next().unwrap_or_default();
        let explicit_domain = parts.next();
        if parts.next().is_some() {
            return Err(CanonError::InvalidCharacters);
        }

        if self.is_anonymous_token(local) {
            debug!(raw = %text, "Login mapped to the anonymous principal");
            return Ok(CanonicalIdentity::anonymous(text));
        }

        if local.is_empty() {
            return Err(CanonError::Empty);
        }
        let local_part = if self.config.username_tolower {
            local.to_lowercase()
        } else {
            local.to_string()
        };
        if let Some(reserved) = RESERVED_NAMES
            .iter()
            .find(|name| local_part.eq_ignore_ascii_case(name))
        {
            return Err(CanonError::Reserved((*reserved).to_string()));
        }

        let domain = match explicit_domain {
            Some(domain) => Some(self.normalize_domain(domain)?),
            None => self.domain_from_ip(client_ip),
        };
        let domain = domain.filter(|d| {
            self.config
                .default_domain
                .as_deref()
                .map_or(true, |default| !default.eq_ignore_ascii_case(d))
        });

        let identity = CanonicalIdentity::new(local_part, domain, text.to_string());
        // Folding and aliases can grow the text; it must still fit when fed back.
        let len = self.canonical_text(&identity).len();
        if len > max {
            return Err(CanonError::TooLong { len, max });
        }
        Ok(identity)
    }

    /// The text form of `identity` handed back to the mechanism layer.
    ///
    /// Canonicalizing it again yields the same identity from any client
    /// address: with virtual domains on, a default-realm identity spells out
    /// the default domain so the address map cannot supply another one.
    pub fn canonical_text(&self, identity: &CanonicalIdentity) -> String {
        let separator = self.config.domain_separator;
        match (identity.domain(), self.config.default_domain.as_deref()) {
            (None, Some(default)) if self.config.virtual_domains && !identity.is_anonymous() => {
                format!(
                    "{}{}{}",
                    identity.local_part(),
                    separator,
                    default.to_ascii_lowercase()
                )
            }
            _ => identity.qualified_with(separator),
        }
    }

    /// Mechanism callback form: writes the canonical text into `out`.
    ///
    /// Returns the number of bytes written. The output is never truncated;
    /// a buffer that is too small fails with [`CanonError::OutputOverflow`].
    pub fn canonicalize_into(
        &self,
        raw: &[u8],
        client_ip: Option<IpAddr>,
        out: &mut [u8],
    ) -> Result<usize> {
        let identity = self.canonicalize(raw, client_ip)?;
        let text = self.canonical_text(&identity);
        let bytes = text.as_bytes();
        if bytes.len() > out.len() {
            return Err(CanonError::OutputOverflow {
                needed: bytes.len(),
                capacity: out.len(),
            });
        }
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn is_anonymous_token(&self, local: &str) -> bool {
        local.eq_ignore_ascii_case(&self.config.anonymous_login)
            || local.eq_ignore_ascii_case(ANONYMOUS_PRINCIPAL)
    }

    fn domain_from_ip(&self, client_ip: Option<IpAddr>) -> Option<String> {
        if !self.config.virtual_domains {
            return None;
        }
        let ip = client_ip?;
        let mapped = self.mapper.domain_for(ip)?;
        match self.normalize_domain(&mapped) {
            Ok(domain) => {
                debug!(%ip, %domain, "Domain derived from client address");
                Some(domain)
            }
            Err(e) => {
                tracing::warn!(%ip, domain = %mapped, "Ignoring mapped virtual domain: {}", e);
                None
            }
        }
    }

    /// Lower-case, drop one trailing dot, validate, then resolve aliases.
    fn normalize_domain(&self, domain: &str) -> Result<String> {
        let domain = normalize_domain_syntax(domain)?;
        let alias = self
            .config
            .domain_aliases
            .iter()
            .find(|(alias, _)| {
                normalize_domain_syntax(alias)
                    .map(|a| a == domain)
                    .unwrap_or(false)
            });
        match alias {
            Some((_, target)) => normalize_domain_syntax(target),
            None => Ok(domain),
        }
    }
}

fn normalize_domain_syntax(domain: &str) -> Result<String> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() {
        return Err(CanonError::EmptyDomain);
    }
    let valid = domain
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    if !valid {
        return Err(CanonError::InvalidCharacters);
    }
    Ok(domain.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtdomain::NoDomainMap;
    use configuration::VirtualDomainRule;
    use rstest::rstest;
    use std::collections::HashMap;

    fn canonicalizer(config: GateConfig) -> Canonicalizer {
        Canonicalizer::new(Arc::new(config))
    }

    fn default_canon() -> Canonicalizer {
        canonicalizer(GateConfig::default())
    }

    fn virtual_canon() -> Canonicalizer {
        canonicalizer(GateConfig {
            virtual_domains: true,
            virtual_domain_map: vec![VirtualDomainRule {
                network: "10.1.0.0/16".to_string(),
                domain: "Corp.Internal".to_string(),
            }],
            ..GateConfig::default()
        })
    }

    /// Case is folded for both parts of the login
    #[test]
    fn test_case_folding() {
        let id = default_canon()
            .canonicalize(b"Alice@EXAMPLE.COM", None)
            .unwrap();
        assert_eq!(id.local_part(), "alice");
        assert_eq!(id.domain(), Some("example.com"));
        assert_eq!(id.raw(), "Alice@EXAMPLE.COM");
    }

    /// Local part case is kept when folding is switched off
    #[test]
    fn test_case_preserved_when_configured() {
        let canon = canonicalizer(GateConfig {
            username_tolower: false,
            ..GateConfig::default()
        });
        let id = canon.canonicalize(b"Alice@EXAMPLE.COM", None).unwrap();
        assert_eq!(id.local_part(), "Alice");
        assert_eq!(id.domain(), Some("example.com"));
    }

    /// A login without domain takes the domain of the client network
    #[test]
    fn test_virtual_domain_from_ip() {
        let ip: IpAddr = "10.1.4.4".parse().unwrap();
        let id = virtual_canon().canonicalize(b"Alice", Some(ip)).unwrap();
        assert_eq!(id.domain(), Some("corp.internal"));

        let explicit = virtual_canon()
            .canonicalize(b"Alice@EXAMPLE.COM", Some(ip))
            .unwrap();
        assert_eq!(explicit.domain(), Some("example.com"));
    }

    /// Unmapped addresses and disabled virtual domains leave the default realm
    #[test]
    fn test_unmapped_ip_is_default_realm() {
        let outside: IpAddr = "192.0.2.1".parse().unwrap();
        let id = virtual_canon().canonicalize(b"alice", Some(outside)).unwrap();
        assert_eq!(id.domain(), None);

        let no_ip = virtual_canon().canonicalize(b"alice", None).unwrap();
        assert_eq!(no_ip.domain(), None);

        let inside: IpAddr = "10.1.4.4".parse().unwrap();
        let disabled = default_canon().canonicalize(b"alice", Some(inside)).unwrap();
        assert_eq!(disabled.domain(), None);
    }

    /// An injected mapper replaces the configured table
    #[test]
    fn test_injected_mapper() {
        let config = Arc::new(GateConfig {
            virtual_domains: true,
            virtual_domain_map: vec![VirtualDomainRule {
                network: "0.0.0.0/0".to_string(),
                domain: "everything.example".to_string(),
            }],
            ..GateConfig::default()
        });
        let canon = Canonicalizer::with_mapper(config, Arc::new(NoDomainMap));
        let id = canon
            .canonicalize(b"alice", Some("192.0.2.1".parse().unwrap()))
            .unwrap();
        assert_eq!(id.domain(), None);
    }

    /// Anonymous logins collapse to one principal
    #[rstest]
    #[case(b"anonymous".as_slice())]
    #[case(b"ANONYMOUS".as_slice())]
    #[case(b"Anonymous   ".as_slice())]
    #[case(b"anonymous\t".as_slice())]
    #[case(b"anonymous \t ".as_slice())]
    #[case(b"anonymous@example.com".as_slice())]
    fn test_anonymous_token(#[case] raw: &[u8]) {
        let id = default_canon().canonicalize(raw, None).unwrap();
        assert!(id.is_anonymous());
        assert_eq!(id, CanonicalIdentity::anonymous(""));
    }

    /// A configured token maps to the same anonymous principal
    #[test]
    fn test_custom_anonymous_token() {
        let canon = canonicalizer(GateConfig {
            anonymous_login: "guest".to_string(),
            ..GateConfig::default()
        });
        assert!(canon.canonicalize(b"Guest ", None).unwrap().is_anonymous());
        assert!(canon.canonicalize(b"anonymous", None).unwrap().is_anonymous());
    }

    /// Malformed input is rejected rather than repaired
    #[rstest]
    #[case(b"ali\0ce".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"alice\r\n".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"alice\t\n".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"al ice".as_slice(), CanonError::InvalidCharacters)]
    #[case(b" alice".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"alice@a@b".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"alice@exa_mple.com".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"alice@example..com".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"\xff\xfe".as_slice(), CanonError::InvalidCharacters)]
    #[case(b"".as_slice(), CanonError::Empty)]
    #[case(b"   ".as_slice(), CanonError::Empty)]
    #[case(b"@example.com".as_slice(), CanonError::Empty)]
    #[case(b"alice@".as_slice(), CanonError::EmptyDomain)]
    #[case(b"alice@.".as_slice(), CanonError::EmptyDomain)]
    #[case(b"Anyone".as_slice(), CanonError::Reserved("anyone".to_string()))]
    #[case(b"anybody@example.com".as_slice(), CanonError::Reserved("anybody".to_string()))]
    fn test_rejects(#[case] raw: &[u8], #[case] expected: CanonError) {
        assert_eq!(default_canon().canonicalize(raw, None), Err(expected));
    }

    /// Length is checked against the configured maximum before anything else
    #[test]
    fn test_too_long() {
        let canon = canonicalizer(GateConfig {
            max_login_length: 8,
            ..GateConfig::default()
        });
        assert!(canon.canonicalize(b"abcdefgh", None).is_ok());
        assert_eq!(
            canon.canonicalize(b"abcdefghi", None),
            Err(CanonError::TooLong { len: 9, max: 8 })
        );
    }

    /// The canonical form must also fit within the limit
    #[test]
    fn test_too_long_after_normalization() {
        let canon = canonicalizer(GateConfig {
            max_login_length: 8,
            ..GateConfig::default()
        });
        // U+0130 lower-cases to "i" plus a combining dot, 2 bytes to 3
        let dotted_i = "\u{130}\u{130}\u{130}\u{130}";
        assert_eq!(dotted_i.len(), 8);
        assert_eq!(
            canon.canonicalize(dotted_i.as_bytes(), None),
            Err(CanonError::TooLong { len: 12, max: 8 })
        );

        let mut aliases = HashMap::new();
        aliases.insert("a.io".to_string(), "long-target.example".to_string());
        let canon = canonicalizer(GateConfig {
            max_login_length: 10,
            domain_aliases: aliases,
            ..GateConfig::default()
        });
        assert_eq!(
            canon.canonicalize(b"b@a.io", None),
            Err(CanonError::TooLong { len: 21, max: 10 })
        );
    }

    /// Trailing dots, aliases and the default domain all normalize away
    #[test]
    fn test_domain_normalization() {
        let mut aliases = HashMap::new();
        aliases.insert("Mail.Example.COM".to_string(), "example.com".to_string());
        let canon = canonicalizer(GateConfig {
            default_domain: Some("Default.Example".to_string()),
            domain_aliases: aliases,
            ..GateConfig::default()
        });

        let dotted = canon.canonicalize(b"bob@example.com.", None).unwrap();
        let aliased = canon.canonicalize(b"BOB@mail.example.com", None).unwrap();
        let plain = canon.canonicalize(b"bob@example.com", None).unwrap();
        assert_eq!(dotted, plain);
        assert_eq!(aliased, plain);

        let default_realm = canon.canonicalize(b"bob@default.example", None).unwrap();
        assert_eq!(default_realm.domain(), None);
        assert_eq!(default_realm, canon.canonicalize(b"bob", None).unwrap());
    }

    /// A different separator splits the domain the same way
    #[test]
    fn test_custom_separator() {
        let canon = canonicalizer(GateConfig {
            domain_separator: '%',
            ..GateConfig::default()
        });
        let id = canon.canonicalize(b"bob%example.com", None).unwrap();
        assert_eq!(id.domain(), Some("example.com"));
        let mut out = [0u8; 64];
        let n = canon.canonicalize_into(b"Bob%Example.com", None, &mut out).unwrap();
        assert_eq!(&out[..n], b"bob%example.com");
    }

    /// Canonicalizing the canonical text yields the same identity
    #[rstest]
    #[case(b"Alice@EXAMPLE.COM".as_slice())]
    #[case(b"bob".as_slice())]
    #[case(b"Carol@Sub.Example.Org.".as_slice())]
    #[case(b"ANONYMOUS ".as_slice())]
    fn test_idempotent(#[case] raw: &[u8]) {
        let canon = default_canon();
        let first = canon.canonicalize(raw, None).unwrap();
        let second = canon
            .canonicalize(first.qualified().as_bytes(), None)
            .unwrap();
        assert_eq!(first, second);
    }

    /// The default realm survives a round trip from a mapped address
    #[test]
    fn test_default_realm_round_trip_with_virtual_domains() {
        let canon = canonicalizer(GateConfig {
            virtual_domains: true,
            default_domain: Some("Example.ORG".to_string()),
            virtual_domain_map: vec![VirtualDomainRule {
                network: "10.1.0.0/16".to_string(),
                domain: "corp.internal".to_string(),
            }],
            ..GateConfig::default()
        });
        let ip: IpAddr = "10.1.2.3".parse().unwrap();

        let first = canon.canonicalize(b"bob@example.org", Some(ip)).unwrap();
        assert_eq!(first.domain(), None);
        let text = canon.canonical_text(&first);
        assert_eq!(text, "bob@example.org");
        let second = canon.canonicalize(text.as_bytes(), Some(ip)).unwrap();
        assert_eq!(first, second);

        let mut out = [0u8; 32];
        let n = canon.canonicalize_into(b"BOB@Example.org", Some(ip), &mut out).unwrap();
        assert_eq!(&out[..n], b"bob@example.org");

        let mapped = canon.canonicalize(b"bob", Some(ip)).unwrap();
        assert_eq!(canon.canonical_text(&mapped), "bob@corp.internal");
        assert_ne!(mapped, first);
    }

    /// The bounded-buffer form reports overflow instead of truncating
    #[test]
    fn test_canonicalize_into() {
        let canon = default_canon();
        let mut out = [0u8; 32];
        let n = canon
            .canonicalize_into(b"Alice@EXAMPLE.COM", None, &mut out)
            .unwrap();
        assert_eq!(&out[..n], b"alice@example.com");

        let mut small = [0u8; 5];
        assert_eq!(
            canon.canonicalize_into(b"Alice@EXAMPLE.COM", None, &mut small),
            Err(CanonError::OutputOverflow {
                needed: 17,
                capacity: 5
            })
        );
    }
}
