//! Configuration loading for the mailgate authentication gate.
//!
//! Configuration lives in YAML files (`config.<id>.yaml`) describing one
//! module each. The `gate` module is turned into a typed, frozen
//! [`GateConfig`] snapshot that connection handlers share by `Arc`.

pub mod definition;
pub mod error;
pub mod gate;
pub mod handle;

pub use definition::{Configuration, ConfigurationDefinition, ConfigurationLoader, GenericConfiguration};
pub use error::{ConfigurationError, Result};
pub use gate::{
    GateConfig, SaslSettings, SecFlags, SecurityRequirements, VirtualDomainRule,
    GATE_CONFIGURATION_ID,
};
pub use handle::ConfigHandle;
