pub mod authorize;
pub mod canon;
pub mod config;
pub mod session;

use anyhow::{anyhow, Result};
use configuration::{ConfigurationError, GateConfig};
use std::path::Path;

use crate::utils::env_paths;

/// Load the gate configuration, falling back to defaults when the
/// directory has no `gate` module.
pub async fn load_config(dir: &Path) -> Result<GateConfig> {
    let environment = env_paths::get_environment();
    match GateConfig::load(dir, &environment).await {
        Ok(config) => Ok(config),
        Err(ConfigurationError::NotFound(message)) => {
            tracing::warn!("{}; using built-in defaults", message);
            Ok(GateConfig::default())
        }
        Err(e) => Err(anyhow!("Failed to load configuration: {}", e)),
    }
}
