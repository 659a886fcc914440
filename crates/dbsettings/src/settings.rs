//! Connection settings value types and well-known names.

use serde::{Deserialize, Serialize};

use crate::error::{DbSettingsError, Result};

/// Full SQL Server client provider.
pub const PROVIDER_SQL_CLIENT: &str = "System.Data.SqlClient";

/// Embedded single-file SQL Server Compact provider.
pub const PROVIDER_SQL_CE: &str = "System.Data.SqlServerCe.4.0";

/// Configuration key of the template entry used for convention-based synthesis.
pub const LOCAL_SERVER: &str = "LocalServer";

/// File extension of embedded database files.
pub const EMBEDDED_EXTENSION: &str = "sdf";

/// Resolved connection settings for one logical database.
///
/// Values are immutable once built; the registry hands them out behind an
/// `Arc` so every caller resolving the same name shares one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    name: String,
    connection_string: String,
    provider_name: String,
}

impl ConnectionSettings {
    /// Build settings, rejecting any empty field.
    pub fn new(
        name: impl Into<String>,
        connection_string: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let connection_string = connection_string.into();
        let provider_name = provider_name.into();

        if name.is_empty() {
            return Err(DbSettingsError::invalid_argument("name"));
        }
        if connection_string.is_empty() {
            return Err(DbSettingsError::invalid_argument("connection_string"));
        }
        if provider_name.is_empty() {
            return Err(DbSettingsError::invalid_argument("provider_name"));
        }

        Ok(Self {
            name,
            connection_string,
            provider_name,
        })
    }

    /// Wrap an entry read from a configuration source.
    ///
    /// The name may be empty here: lookups accept the empty string as a key.
    /// Callers check the entry's fields are non-empty.
    pub(crate) fn from_entry(name: &str, entry: ConnectionEntry) -> Self {
        Self {
            name: name.to_string(),
            connection_string: entry.connection_string,
            provider_name: entry.provider_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.provider_name)
    }
}

/// A connection record as stored in an external configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub connection_string: String,
    pub provider_name: String,
}

impl ConnectionEntry {
    pub fn new(connection_string: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            provider_name: provider_name.into(),
        }
    }
}

/// How a cached entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsOrigin {
    /// Supplied through `SettingsRegistry::register`
    Registered,
    /// Copied from an explicit configuration entry
    Configured,
    /// Derived from the template entry
    Conventional,
    /// Embedded-file fallback (no usable template)
    EmbeddedFallback,
}

impl SettingsOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Configured => "configured",
            Self::Conventional => "conventional",
            Self::EmbeddedFallback => "embedded_fallback",
        }
    }
}

impl std::fmt::Display for SettingsOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
