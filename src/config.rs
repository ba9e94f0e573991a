use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::resolver::{ResolveConfig, DEFAULT_MAX_DEPTH};

/// Looked up in the project root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "portwire.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Project conventions. Every field has a default, so an empty file or no
/// file at all is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PortwireConfig {
    /// Suffix of package directories scanned for sources.
    pub package_suffix: String,
    /// Suffix of class types that form the component hierarchy.
    pub component_suffix: String,
    /// Method holding wiring statements.
    pub registration_method: String,
    /// Bound on forwarding and getter hops per trace.
    pub max_depth: usize,
    /// Member prefixes stripped when deriving accessor names.
    pub storage_prefixes: Vec<String>,
    /// Interface name to port base name, consulted before derivation.
    pub port_aliases: IndexMap<String, String>,
    /// Keep a `.bak` copy of every modified file.
    pub backup: bool,
}

impl Default for PortwireConfig {
    fn default() -> Self {
        Self {
            package_suffix: "Pkg".to_string(),
            component_suffix: "Cls".to_string(),
            registration_method: "InitRelations".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            storage_prefixes: vec!["m_".to_string()],
            port_aliases: IndexMap::new(),
            backup: true,
        }
    }
}

impl PortwireConfig {
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// An explicit path wins, then `portwire.yaml` in the project root, then
    /// the defaults.
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading configuration");
            return Self::load(path);
        }
        let candidate = project_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "loading configuration");
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("package_suffix", &self.package_suffix),
            ("component_suffix", &self.component_suffix),
            ("registration_method", &self.registration_method),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        if let Some((interface, _)) = self.port_aliases.iter().find(|(_, alias)| alias.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("port alias for {interface} must not be empty")));
        }
        Ok(())
    }

    pub fn resolve_config(&self) -> ResolveConfig {
        ResolveConfig {
            max_depth: self.max_depth,
            registration_method: self.registration_method.clone(),
        }
    }
}
