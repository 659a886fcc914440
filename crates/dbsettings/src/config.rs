//! File configuration for the settings registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DbSettingsError, Result};
use crate::settings::{
    ConnectionEntry, EMBEDDED_EXTENSION, LOCAL_SERVER, PROVIDER_SQL_CE, PROVIDER_SQL_CLIENT,
};
use crate::source::ConnectionSource;

/// Environment variable overriding the default config file location.
pub const CONFIG_ENV: &str = "DBSETTINGS_CONFIG";

/// Config file looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "dbsettings.toml";

/// Convention-synthesis options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOptions {
    /// Key of the template entry used to derive unconfigured names
    #[serde(default = "default_template")]
    pub template: String,

    /// Provider the template must use for server-based synthesis
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,

    /// Provider tagged on embedded-file fallback entries
    #[serde(default = "default_embedded_provider")]
    pub embedded_provider: String,

    /// File extension of embedded-file fallback databases
    #[serde(default = "default_embedded_extension")]
    pub embedded_extension: String,

    /// Fail instead of falling back to an embedded file when the template is
    /// missing or uses another provider
    #[serde(default)]
    pub strict: bool,
}

fn default_template() -> String {
    LOCAL_SERVER.to_string()
}

fn default_primary_provider() -> String {
    PROVIDER_SQL_CLIENT.to_string()
}

fn default_embedded_provider() -> String {
    PROVIDER_SQL_CE.to_string()
}

fn default_embedded_extension() -> String {
    EMBEDDED_EXTENSION.to_string()
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            template: default_template(),
            primary_provider: default_primary_provider(),
            embedded_provider: default_embedded_provider(),
            embedded_extension: default_embedded_extension(),
            strict: false,
        }
    }
}

impl RegistryOptions {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

/// Explicit connection entries keyed by logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionStrings(BTreeMap<String, ConnectionEntry>);

impl ConnectionStrings {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConnectionEntry)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ConnectionEntry) {
        self.0.insert(name.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ConnectionSource for ConnectionStrings {
    fn lookup(&self, name: &str) -> Option<ConnectionEntry> {
        self.0.get(name).cloned()
    }
}

/// Top-level config file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSettingsConfig {
    #[serde(default)]
    pub registry: RegistryOptions,

    #[serde(default)]
    pub connection_strings: ConnectionStrings,
}

impl DbSettingsConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| DbSettingsError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DbSettingsConfig =
            toml::from_str(content).map_err(|e| DbSettingsError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DbSettingsError::config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from an explicit path, `DBSETTINGS_CONFIG`, or `./dbsettings.toml`.
    ///
    /// Only a missing default file is tolerated (yields an empty config); an
    /// explicitly named file must exist.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(&PathBuf::from(path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.registry.template.is_empty() {
            return Err(DbSettingsError::config("registry.template must not be empty"));
        }
        if self.registry.embedded_provider.is_empty() {
            return Err(DbSettingsError::config(
                "registry.embedded_provider must not be empty",
            ));
        }
        for (name, entry) in self.connection_strings.iter() {
            if entry.connection_string.is_empty() {
                return Err(DbSettingsError::config(format!(
                    "connection_strings.{}: connection_string must not be empty",
                    name
                )));
            }
            if entry.provider_name.is_empty() {
                return Err(DbSettingsError::config(format!(
                    "connection_strings.{}: provider_name must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}
