//! Access-class membership.
//!
//! A class is a named list of entries from configuration:
//!
//! - `alice@example.com`: one identity, canonicalized at load so any spelling
//!   of it in configuration matches
//! - `*@example.com`: every identity in that domain
//! - `anyone`: every identity
//! - `group:postmasters`: members of a group, resolved via [`GroupDirectory`]
//!
//! Classes are loaded once and then only read, from any number of threads.

use configuration::GateConfig;
use identity::{CanonicalIdentity, Canonicalizer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AuthzError, Result};
use crate::types::AccessClassName;

const GROUP_PREFIX: &str = "group:";
const ANYONE: &str = "anyone";
const DOMAIN_WILDCARD: &str = "*";

/// Answers group membership for `group:` entries.
pub trait GroupDirectory: Send + Sync {
    fn is_member(&self, group: &str, identity: &CanonicalIdentity) -> Result<bool>;
}

/// A directory without any groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGroups;

impl GroupDirectory for NoGroups {
    fn is_member(&self, _group: &str, _identity: &CanonicalIdentity) -> Result<bool> {
        Ok(false)
    }
}

/// Groups listed in the `groups` configuration section.
#[derive(Debug, Clone, Default)]
pub struct StaticGroups {
    groups: HashMap<String, Vec<CanonicalIdentity>>,
}

impl StaticGroups {
    pub fn from_config(config: &GateConfig, canon: &Canonicalizer) -> Self {
        let mut groups = HashMap::new();
        for (name, members) in &config.groups {
            let members = members
                .iter()
                .filter_map(|member| match canon.canonicalize(member.as_bytes(), None) {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        warn!(group = %name, member = %member, "Skipping group member: {}", e);
                        None
                    }
                })
                .collect();
            groups.insert(name.clone(), members);
        }
        Self { groups }
    }
}

impl GroupDirectory for StaticGroups {
    fn is_member(&self, group: &str, identity: &CanonicalIdentity) -> Result<bool> {
        Ok(self
            .groups
            .get(group)
            .map_or(false, |members| members.contains(identity)))
    }
}

/// One parsed class entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassEntry {
    Identity(CanonicalIdentity),
    /// `None` is the default realm
    Domain(Option<String>),
    Anyone,
    Group(String),
}

impl ClassEntry {
    pub fn parse(entry: &str, canon: &Canonicalizer) -> Result<Self> {
        let invalid = |reason: String| AuthzError::InvalidClassEntry {
            entry: entry.to_string(),
            reason,
        };
        let entry = entry.trim();

        if entry.eq_ignore_ascii_case(ANYONE) {
            return Ok(ClassEntry::Anyone);
        }
        if let Some(group) = entry.strip_prefix(GROUP_PREFIX) {
            if group.is_empty() {
                return Err(invalid("empty group name".to_string()));
            }
            return Ok(ClassEntry::Group(group.to_string()));
        }

        let separator = canon.config().domain_separator;
        if let Some(domain) = entry
            .strip_prefix(DOMAIN_WILDCARD)
            .and_then(|rest| rest.strip_prefix(separator))
        {
            // Canonicalize a placeholder login to get the domain exactly as
            // identities in that domain will carry it.
            let placeholder = format!("postmaster{}{}", separator, domain);
            let identity = canon
                .canonicalize(placeholder.as_bytes(), None)
                .map_err(|e| invalid(e.to_string()))?;
            return Ok(ClassEntry::Domain(identity.domain().map(str::to_string)));
        }

        canon
            .canonicalize(entry.as_bytes(), None)
            .map(ClassEntry::Identity)
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Immutable set of named access classes.
pub struct AccessClasses {
    classes: HashMap<String, Vec<ClassEntry>>,
    groups: Arc<dyn GroupDirectory>,
}

impl AccessClasses {
    /// Load classes from configuration, resolving groups from `groups:`.
    pub fn from_config(config: &GateConfig, canon: &Canonicalizer) -> Self {
        let groups = Arc::new(StaticGroups::from_config(config, canon));
        Self::with_directory(config, canon, groups)
    }

    /// Load classes with an external group directory.
    pub fn with_directory(
        config: &GateConfig,
        canon: &Canonicalizer,
        groups: Arc<dyn GroupDirectory>,
    ) -> Self {
        let mut classes = HashMap::new();
        for (name, entries) in &config.access_classes {
            let parsed: Vec<ClassEntry> = entries
                .iter()
                .filter_map(|entry| match ClassEntry::parse(entry, canon) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!(class = %name, "Skipping entry: {}", e);
                        None
                    }
                })
                .collect();
            debug!(class = %name, entries = parsed.len(), "Loaded access class");
            classes.insert(name.clone(), parsed);
        }
        Self { classes, groups }
    }

    /// Whether `identity` belongs to `class`. Unknown classes have no members.
    pub fn is_member(&self, identity: &CanonicalIdentity, class: &AccessClassName) -> bool {
        let Some(entries) = self.classes.get(class.as_str()) else {
            return false;
        };
        entries.iter().any(|entry| self.entry_matches(entry, identity))
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    fn entry_matches(&self, entry: &ClassEntry, identity: &CanonicalIdentity) -> bool {
        match entry {
            ClassEntry::Identity(member) => member == identity,
            ClassEntry::Domain(domain) => {
                !identity.is_anonymous() && identity.domain() == domain.as_deref()
            }
            ClassEntry::Anyone => true,
            ClassEntry::Group(group) => match self.groups.is_member(group, identity) {
                Ok(member) => member,
                Err(e) => {
                    warn!(group = %group, identity = %identity, "Treating as non-member: {}", e);
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config() -> GateConfig {
        let mut access_classes = HashMap::new();
        access_classes.insert(
            "admins".to_string(),
            vec![
                "Cyrus".to_string(),
                "Root@Example.COM.".to_string(),
                "group:postmasters".to_string(),
                "anyone@example.com".to_string(),
            ],
        );
        access_classes.insert(
            "proxy_servers".to_string(),
            vec!["*@Murder.Example.NET".to_string()],
        );
        access_classes.insert("everyone".to_string(), vec!["anyone".to_string()]);

        let mut groups = HashMap::new();
        groups.insert(
            "postmasters".to_string(),
            vec!["pm@example.com".to_string(), "bad user".to_string()],
        );

        GateConfig {
            access_classes,
            groups,
            ..GateConfig::default()
        }
    }

    fn setup() -> (AccessClasses, Canonicalizer) {
        let config = config();
        let canon = Canonicalizer::new(Arc::new(config.clone()));
        (AccessClasses::from_config(&config, &canon), canon)
    }

    fn id(canon: &Canonicalizer, raw: &str) -> CanonicalIdentity {
        canon.canonicalize(raw.as_bytes(), None).unwrap()
    }

    /// Membership uses the canonical form, not the configured spelling
    #[rstest]
    #[case("cyrus", "admins", true)]
    #[case("CYRUS", "admins", true)]
    #[case("root@example.com", "admins", true)]
    #[case("ROOT@EXAMPLE.COM.", "admins", true)]
    #[case("root", "admins", false)]
    #[case("pm@example.com", "admins", true)]
    #[case("bob@example.com", "admins", false)]
    #[case("frontend1@murder.example.net", "proxy_servers", true)]
    #[case("frontend1@example.net", "proxy_servers", false)]
    #[case("bob@example.com", "everyone", true)]
    fn test_membership(#[case] raw: &str, #[case] class: &str, #[case] expected: bool) {
        let (classes, canon) = setup();
        assert_eq!(
            classes.is_member(&id(&canon, raw), &AccessClassName::new(class)),
            expected
        );
    }

    /// Unknown classes have no members
    #[test]
    fn test_unknown_class() {
        let (classes, canon) = setup();
        assert!(!classes.is_member(&id(&canon, "cyrus"), &AccessClassName::new("operators")));
    }

    /// Reserved names in entries are skipped, the rest still load
    #[test]
    fn test_invalid_entries_skipped() {
        let (classes, _) = setup();
        assert!(classes.class_names().any(|n| n == "admins"));
        assert!(matches!(
            ClassEntry::parse("anyone@example.com", &setup().1),
            Err(AuthzError::InvalidClassEntry { .. })
        ));
        assert!(ClassEntry::parse("group:", &setup().1).is_err());
    }

    /// Domain wildcards never match the anonymous principal
    #[test]
    fn test_domain_wildcard_excludes_anonymous() {
        let mut access_classes = HashMap::new();
        access_classes.insert("local".to_string(), vec!["*@".to_string() + "x.example"]);
        let config = GateConfig {
            access_classes,
            ..GateConfig::default()
        };
        let canon = Canonicalizer::new(Arc::new(config.clone()));
        let classes = AccessClasses::from_config(&config, &canon);
        let anon = id(&canon, "anonymous@x.example");
        assert!(!classes.is_member(&anon, &AccessClassName::new("local")));
        assert!(classes.is_member(&id(&canon, "a@X.Example"), &AccessClassName::new("local")));
    }

    struct FailingDirectory;

    impl GroupDirectory for FailingDirectory {
        fn is_member(&self, _group: &str, _identity: &CanonicalIdentity) -> Result<bool> {
            Err(AuthzError::Directory("unreachable".to_string()))
        }
    }

    /// A failing directory means "not a member"
    #[test]
    fn test_directory_failure_is_not_member() {
        let config = config();
        let canon = Canonicalizer::new(Arc::new(config.clone()));
        let classes = AccessClasses::with_directory(&config, &canon, Arc::new(FailingDirectory));
        assert!(!classes.is_member(&id(&canon, "pm@example.com"), &AccessClassName::ADMINS));
        assert!(classes.is_member(&id(&canon, "cyrus"), &AccessClassName::ADMINS));
    }

    /// Classes can be queried from many threads
    #[test]
    fn test_shared_across_threads() {
        let (classes, canon) = setup();
        let classes = Arc::new(classes);
        let cyrus = id(&canon, "cyrus");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let classes = Arc::clone(&classes);
                let cyrus = cyrus.clone();
                std::thread::spawn(move || classes.is_member(&cyrus, &AccessClassName::ADMINS))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
