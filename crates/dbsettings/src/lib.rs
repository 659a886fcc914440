//! Database connection settings registry.
//!
//! Resolves a logical database name to the connection string and provider the
//! data-access layer should use. Resolution order for an unseen name:
//!
//! 1. an explicit entry in the configuration source,
//! 2. a connection derived from the template entry (`LocalServer`) when it
//!    targets the SQL Server client provider,
//! 3. an embedded database file named after the logical name.
//!
//! Results are cached for the lifetime of the registry; explicit registrations
//! replace cached entries.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbsettings::{DbSettingsConfig, SettingsRegistry};
//!
//! let config = DbSettingsConfig::discover(None)?;
//! let registry = SettingsRegistry::with_options(config.connection_strings, config.registry);
//!
//! let orders = registry.resolve("Orders")?;
//! println!("{} via {}", orders.connection_string(), orders.provider_name());
//! ```

pub mod config;
pub mod connection_string;
mod error;
pub mod registry;
mod settings;
pub mod source;

pub use config::{ConnectionStrings, DbSettingsConfig, RegistryOptions};
pub use connection_string::{ConnectionStringBuilder, ConnectionStringError};
pub use error::{DbSettingsError, Result};
pub use registry::{ResolvedEntry, SettingsRegistry};
pub use settings::{
    ConnectionEntry, ConnectionSettings, SettingsOrigin, EMBEDDED_EXTENSION, LOCAL_SERVER,
    PROVIDER_SQL_CE, PROVIDER_SQL_CLIENT,
};
pub use source::{ConnectionSource, MemorySource};
