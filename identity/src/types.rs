use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Local part every anonymous login collapses to.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// A normalized, domain-qualified login name.
///
/// Equality and hashing only look at `local_part` and `domain`; `raw` is the
/// text the client sent and is kept for diagnostics. Instances are only built
/// by the canonicalizer and cannot be changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    local_part: String,
    domain: Option<String>,
    raw: String,
}

impl CanonicalIdentity {
    pub(crate) fn new(local_part: String, domain: Option<String>, raw: String) -> Self {
        Self {
            local_part,
            domain,
            raw,
        }
    }

    /// The fixed anonymous principal.
    pub fn anonymous(raw: impl Into<String>) -> Self {
        Self {
            local_part: ANONYMOUS_PRINCIPAL.to_string(),
            domain: None,
            raw: raw.into(),
        }
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// `None` denotes the default realm.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_anonymous(&self) -> bool {
        self.domain.is_none() && self.local_part == ANONYMOUS_PRINCIPAL
    }

    /// Canonical text joined with the given separator.
    pub fn qualified_with(&self, separator: char) -> String {
        match &self.domain {
            Some(domain) => format!("{}{}{}", self.local_part, separator, domain),
            None => self.local_part.clone(),
        }
    }

    /// Canonical text, `local@domain` or just `local` in the default realm.
    pub fn qualified(&self) -> String {
        self.qualified_with('@')
    }
}

impl PartialEq for CanonicalIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.local_part == other.local_part && self.domain == other.domain
    }
}

impl Eq for CanonicalIdentity {}

impl Hash for CanonicalIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.local_part.hash(state);
        self.domain.hash(state);
    }
}

impl fmt::Display for CanonicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "{}@{}", self.local_part, domain),
            None => f.write_str(&self.local_part),
        }
    }
}
