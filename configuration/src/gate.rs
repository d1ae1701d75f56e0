//! Typed view of the `gate` configuration module.
//!
//! The values are deserialized once into [`GateConfig`] and never mutated
//! afterwards; see [`crate::ConfigHandle`] for how a replacement snapshot is
//! published.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::definition::{Configuration, ConfigurationLoader, GenericConfiguration};
use crate::error::{ConfigurationError, Result};

/// Configuration id the gate reads its options from.
pub const GATE_CONFIGURATION_ID: &str = "gate";

static LOCAL_HOSTNAME: Lazy<String> = Lazy::new(|| {
    whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string())
});

fn default_server_name() -> String {
    LOCAL_HOSTNAME.clone()
}

/// Maps a client network to the virtual domain it logs into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDomainRule {
    /// CIDR notation, e.g. `10.20.0.0/16` or `2001:db8::/32`
    pub network: String,
    pub domain: String,
}

/// Options handed to the mechanism-negotiation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaslSettings {
    pub minimum_layer: u32,
    pub maximum_layer: u32,
    pub allow_plaintext: bool,
    pub allow_anonymous: bool,
    /// Free-form plugin options, keyed `sasl_<plugin>_<option>` or `sasl_<option>`
    pub options: HashMap<String, String>,
}

impl Default for SaslSettings {
    fn default() -> Self {
        Self {
            minimum_layer: 0,
            maximum_layer: 256,
            allow_plaintext: false,
            allow_anonymous: false,
            options: HashMap::new(),
        }
    }
}

/// Extra security flags a service asks for on top of configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecFlags {
    pub no_plaintext: bool,
    pub no_anonymous: bool,
}

/// Security requirements the mechanism layer enforces during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecurityRequirements {
    pub min_ssf: u32,
    pub max_ssf: u32,
    pub max_buffer_size: u32,
    pub no_plaintext: bool,
    pub no_anonymous: bool,
}

/// Largest protection buffer negotiated with the mechanism layer.
pub const MAX_BUFFER_SIZE: u32 = 4096;

/// Frozen gate options, shared read-only by every connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub server_name: String,
    pub domain_separator: char,
    /// Derive a missing domain from the client address
    pub virtual_domains: bool,
    pub default_domain: Option<String>,
    pub domain_aliases: HashMap<String, String>,
    pub virtual_domain_map: Vec<VirtualDomainRule>,
    pub username_tolower: bool,
    pub anonymous_login: String,
    pub max_login_length: usize,
    pub access_classes: HashMap<String, Vec<String>>,
    pub groups: HashMap<String, Vec<String>>,
    pub proxy_min_ssf: u32,
    pub sasl: SaslSettings,
    pub suppress_capabilities: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            domain_separator: '@',
            virtual_domains: false,
            default_domain: None,
            domain_aliases: HashMap::new(),
            virtual_domain_map: Vec::new(),
            username_tolower: true,
            anonymous_login: "anonymous".to_string(),
            max_login_length: 255,
            access_classes: HashMap::new(),
            groups: HashMap::new(),
            proxy_min_ssf: 0,
            sasl: SaslSettings::default(),
            suppress_capabilities: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Build from a loaded `gate` configuration module.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self> {
        if config.id() != GATE_CONFIGURATION_ID {
            return Err(ConfigurationError::ValidationError(format!(
                "expected '{}' configuration, got '{}'",
                GATE_CONFIGURATION_ID,
                config.id()
            )));
        }
        let parsed: GateConfig = serde_yaml::from_value(config.values_as_mapping())?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse a full `gate` configuration document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::from_configuration(&GenericConfiguration::from_yaml(content)?)
    }

    /// Load the `gate` module from a configuration directory.
    pub async fn load(dir: &Path, env: &str) -> Result<Self> {
        let configurations = ConfigurationLoader::load_from_directory(dir, env).await?;
        let gate = configurations
            .iter()
            .find(|c| c.id() == GATE_CONFIGURATION_ID)
            .ok_or_else(|| {
                ConfigurationError::NotFound(format!(
                    "no '{}' configuration in {:?}",
                    GATE_CONFIGURATION_ID, dir
                ))
            })?;
        Self::from_configuration(gate)
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain_separator.is_whitespace()
            || self.domain_separator.is_control()
            || self.domain_separator.is_alphanumeric()
        {
            return Err(ConfigurationError::ValidationError(format!(
                "domain_separator {:?} must be a punctuation character",
                self.domain_separator
            )));
        }
        if self.max_login_length == 0 {
            return Err(ConfigurationError::ValidationError(
                "max_login_length must be positive".to_string(),
            ));
        }
        if self.anonymous_login.trim().is_empty() {
            return Err(ConfigurationError::ValidationError(
                "anonymous_login cannot be empty".to_string(),
            ));
        }
        if self.sasl.minimum_layer > self.sasl.maximum_layer {
            return Err(ConfigurationError::ValidationError(format!(
                "sasl.minimum_layer ({}) exceeds sasl.maximum_layer ({})",
                self.sasl.minimum_layer, self.sasl.maximum_layer
            )));
        }
        Ok(())
    }

    /// Generic option lookup by name; dots descend into nested sections.
    pub fn lookup(&self, option_name: &str) -> Option<Value> {
        let root = serde_yaml::to_value(self).ok()?;
        let mut current = &root;
        for part in option_name.split('.') {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    /// Plugin-scoped option first, then the global one.
    pub fn sasl_option(&self, plugin: Option<&str>, option: &str) -> Option<&str> {
        let options = &self.sasl.options;
        plugin
            .and_then(|p| options.get(&format!("sasl_{}_{}", p, option)))
            .or_else(|| options.get(&format!("sasl_{}", option)))
            .map(String::as_str)
    }

    pub fn security_requirements(&self, extra: SecFlags) -> SecurityRequirements {
        SecurityRequirements {
            min_ssf: self.sasl.minimum_layer,
            max_ssf: self.sasl.maximum_layer,
            max_buffer_size: MAX_BUFFER_SIZE,
            no_plaintext: extra.no_plaintext || !self.sasl.allow_plaintext,
            no_anonymous: extra.no_anonymous || !self.sasl.allow_anonymous,
        }
    }

    pub fn capability_disabled(&self, capability: &str) -> bool {
        self.suppress_capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }

    /// Entries of a named access class, if configured.
    pub fn access_class(&self, name: &str) -> Option<&[String]> {
        self.access_classes.get(name).map(Vec::as_slice)
    }
}
