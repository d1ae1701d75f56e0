use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

use crate::error::{ConfigurationError, Result};

/// On-disk description of one configuration module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDefinition {
    /// Unique identifier for this configuration (e.g. "gate", "system")
    pub id: String,
    /// Human-readable name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The component that owns these values
    pub provider: String,
    /// Version of the configuration schema
    pub version: String,
    /// The actual configuration values
    #[serde(default)]
    pub values: HashMap<String, Value>,
}

/// Read access to a loaded configuration module.
pub trait Configuration: Send + Sync + Debug {
    fn definition(&self) -> &ConfigurationDefinition;

    fn id(&self) -> &str {
        &self.definition().id
    }

    fn provider(&self) -> &str {
        &self.definition().provider
    }

    fn get_value(&self, key: &str) -> Option<&Value>;

    fn get_all_values(&self) -> &HashMap<String, Value>;

    fn validate(&self) -> Result<()>;

    /// Merge with another configuration of the same id; `other` wins.
    fn merge(&mut self, other: &dyn Configuration) -> Result<()>;

    fn to_yaml(&self) -> Result<String>;
}

/// Configuration backed directly by its definition.
#[derive(Debug, Clone)]
pub struct GenericConfiguration {
    definition: ConfigurationDefinition,
}

impl GenericConfiguration {
    pub fn new(definition: ConfigurationDefinition) -> Self {
        Self { definition }
    }

    /// Create from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: ConfigurationDefinition = serde_yaml::from_str(content)?;
        Ok(Self::new(definition))
    }

    /// Values as a single YAML mapping, ready for typed deserialization.
    pub fn values_as_mapping(&self) -> Value {
        let mut mapping = serde_yaml::Mapping::new();
        for (key, value) in &self.definition.values {
            mapping.insert(Value::String(key.clone()), value.clone());
        }
        Value::Mapping(mapping)
    }
}

impl Configuration for GenericConfiguration {
    fn definition(&self) -> &ConfigurationDefinition {
        &self.definition
    }

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.definition.values.get(key)
    }

    fn get_all_values(&self) -> &HashMap<String, Value> {
        &self.definition.values
    }

    fn validate(&self) -> Result<()> {
        if self.definition.id.is_empty() {
            return Err(ConfigurationError::ValidationError(
                "Configuration ID cannot be empty".to_string(),
            ));
        }
        if self.definition.provider.is_empty() {
            return Err(ConfigurationError::ValidationError(
                "Configuration provider cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn merge(&mut self, other: &dyn Configuration) -> Result<()> {
        if self.id() != other.id() {
            return Err(ConfigurationError::MergeError(format!(
                "Cannot merge configurations with different IDs: {} and {}",
                self.id(),
                other.id()
            )));
        }

        for (key, value) in other.get_all_values() {
            self.definition.values.insert(key.clone(), value.clone());
        }

        Ok(())
    }

    fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.definition)
            .map_err(|e| ConfigurationError::SerializationError(e.to_string()))
    }
}

/// Loads `config.*.yaml` files from a directory.
pub struct ConfigurationLoader;

impl ConfigurationLoader {
    /// Load and merge every configuration in `dir` for the given environment.
    ///
    /// `config.system.<env>.yaml` is only picked up when `<env>` matches;
    /// other `config.*` files always load. Files sharing an id are merged in
    /// file-name order so later files override earlier ones. A missing
    /// directory yields an empty list; a file that fails to parse or
    /// validate fails the whole load.
    pub async fn load_from_directory(dir: &Path, env: &str) -> Result<Vec<GenericConfiguration>> {
        let mut configurations: Vec<GenericConfiguration> = Vec::new();

        if !tokio::fs::try_exists(dir).await? {
            tracing::debug!("Configuration directory {:?} does not exist", dir);
            return Ok(configurations);
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();

        for path in paths {
            let Some(extension) = path.extension() else {
                continue;
            };
            if extension != "yaml" && extension != "yml" {
                continue;
            }
            let Some(stem) = path.file_stem() else {
                continue;
            };
            let filename = stem.to_string_lossy();
            if !filename.starts_with("config.") {
                continue;
            }
            if filename.starts_with("config.system.") && filename != format!("config.system.{}", env)
            {
                tracing::debug!(
                    "Skipping configuration file for different environment: {:?}",
                    path
                );
                continue;
            }

            let content = tokio::fs::read_to_string(&path).await?;
            let definition: ConfigurationDefinition =
                serde_yaml::from_str(&content).map_err(|e| {
                    tracing::error!("Failed to load configuration from {:?}: {}", path, e);
                    ConfigurationError::ParseError(format!("{}: {}", path.display(), e))
                })?;
            let config = GenericConfiguration::new(definition);
            if let Err(ConfigurationError::ValidationError(message)) = config.validate() {
                return Err(ConfigurationError::ValidationError(format!(
                    "{}: {}",
                    path.display(),
                    message
                )));
            }

            match configurations.iter_mut().find(|c| c.id() == config.id()) {
                Some(existing) => existing.merge(&config)?,
                None => configurations.push(config),
            }
            tracing::info!("Loaded configuration from {:?}", path);
        }

        tracing::info!(
            "Loaded {} configurations from {:?} for environment: {}",
            configurations.len(),
            dir,
            env
        );
        Ok(configurations)
    }
}
