//! Registry mapping logical database names to resolved connection settings.
//!
//! Each name owns a slot holding a `OnceCell`. The map lock is only held to
//! find or insert a slot; the slow path (configuration lookup and convention
//! synthesis) runs inside the slot's `get_or_try_init`, so concurrent callers
//! for one unseen name share a single resolution while other names proceed
//! independently.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::config::RegistryOptions;
use crate::connection_string::ConnectionStringBuilder;
use crate::error::{DbSettingsError, Result};
use crate::settings::{ConnectionEntry, ConnectionSettings, SettingsOrigin};
use crate::source::ConnectionSource;

type Slot = Arc<OnceCell<ResolvedEntry>>;

/// A cached registry entry together with how it was produced.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub settings: Arc<ConnectionSettings>,
    pub origin: SettingsOrigin,
}

impl ResolvedEntry {
    fn new(settings: ConnectionSettings, origin: SettingsOrigin) -> Self {
        Self {
            settings: Arc::new(settings),
            origin,
        }
    }
}

/// Concurrency-safe cache of connection settings keyed by logical name.
///
/// Owned explicitly by the application's composition root and shared by
/// reference (or `Arc`) with the data-access layer.
pub struct SettingsRegistry<S> {
    source: S,
    options: RegistryOptions,
    slots: RwLock<HashMap<String, Slot>>,
}

impl<S: ConnectionSource> SettingsRegistry<S> {
    /// Create a registry over `source` with default synthesis options.
    pub fn new(source: S) -> Self {
        Self::with_options(source, RegistryOptions::default())
    }

    pub fn with_options(source: S, options: RegistryOptions) -> Self {
        Self {
            source,
            options,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve `name`, loading or synthesizing its settings on first use.
    ///
    /// The empty string is a valid key. Explicit configuration wins over
    /// convention; a failed resolution is not cached.
    pub fn resolve(&self, name: &str) -> Result<Arc<ConnectionSettings>> {
        Ok(self.resolve_entry(name)?.settings)
    }

    /// Like [`resolve`](Self::resolve) for callers holding an optional name.
    pub fn resolve_opt(&self, name: Option<&str>) -> Result<Arc<ConnectionSettings>> {
        let name = name.ok_or_else(|| DbSettingsError::invalid_argument("name"))?;
        self.resolve(name)
    }

    /// Resolve `name` and report how the entry was produced.
    pub fn resolve_entry(&self, name: &str) -> Result<ResolvedEntry> {
        let slot = self.slot_for(name);
        if let Some(entry) = slot.get() {
            debug!(name, "Connection settings cache hit");
            return Ok(entry.clone());
        }
        match slot.get_or_try_init(|| self.load(name)) {
            Ok(entry) => Ok(entry.clone()),
            Err(e) => {
                self.discard_empty_slot(name, &slot);
                Err(e)
            }
        }
    }

    /// Register (or replace) settings for `name`.
    ///
    /// Does not consult the configuration source. Subsequent resolutions of
    /// `name` return these settings until replaced again.
    pub fn register(
        &self,
        name: impl Into<String>,
        connection_string: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Result<Arc<ConnectionSettings>> {
        let settings = ConnectionSettings::new(name, connection_string, provider_name)?;
        let entry = ResolvedEntry::new(settings, SettingsOrigin::Registered);
        let settings = Arc::clone(&entry.settings);
        let key = settings.name().to_string();

        let replaced = self
            .write_slots()
            .insert(key, Arc::new(OnceCell::with_value(entry)))
            .is_some_and(|slot| slot.get().is_some());

        info!(
            name = settings.name(),
            provider = settings.provider_name(),
            replaced,
            "Registered connection settings"
        );
        Ok(settings)
    }

    /// Cached settings for `name`, without resolving.
    pub fn get(&self, name: &str) -> Option<Arc<ConnectionSettings>> {
        self.read_slots()
            .get(name)
            .and_then(|slot| slot.get())
            .map(|entry| Arc::clone(&entry.settings))
    }

    /// How the cached entry for `name` was produced, if it is cached.
    pub fn origin(&self, name: &str) -> Option<SettingsOrigin> {
        self.read_slots()
            .get(name)
            .and_then(|slot| slot.get())
            .map(|entry| entry.origin)
    }

    /// Point-in-time copy of every resolved entry, in no particular order.
    pub fn list_resolved(&self) -> Vec<Arc<ConnectionSettings>> {
        self.snapshot()
            .into_iter()
            .map(|entry| entry.settings)
            .collect()
    }

    /// Point-in-time copy of every resolved entry with its origin.
    ///
    /// Names still being resolved are left out.
    pub fn snapshot(&self) -> Vec<ResolvedEntry> {
        self.read_slots()
            .values()
            .filter_map(|slot| slot.get().cloned())
            .collect()
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.read_slots()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_for(&self, name: &str) -> Slot {
        if let Some(slot) = self.read_slots().get(name) {
            return Arc::clone(slot);
        }
        let mut slots = self.write_slots();
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    // Drop a slot left empty by a failed resolution, unless it was replaced
    // or filled by another caller meanwhile.
    fn discard_empty_slot(&self, name: &str, slot: &Slot) {
        let mut slots = self.write_slots();
        let current_is_empty = slots
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none());
        if current_is_empty {
            slots.remove(name);
        }
    }

    // Slots are only ever inserted or removed whole, so a poisoned map is still consistent.
    fn read_slots(&self) -> RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, name: &str) -> Result<ResolvedEntry> {
        if let Some(entry) = self.source.lookup(name) {
            if entry.connection_string.is_empty() {
                return Err(DbSettingsError::configuration(
                    name,
                    "connection_string must not be empty",
                ));
            }
            if entry.provider_name.is_empty() {
                return Err(DbSettingsError::configuration(
                    name,
                    "provider_name must not be empty",
                ));
            }
            debug!(name, provider = %entry.provider_name, "Using configured connection entry");
            return Ok(ResolvedEntry::new(
                ConnectionSettings::from_entry(name, entry),
                SettingsOrigin::Configured,
            ));
        }
        self.synthesize(name)
    }

    fn synthesize(&self, name: &str) -> Result<ResolvedEntry> {
        let template_key = self.options.template.as_str();

        match self.source.lookup(template_key) {
            Some(template) if template.provider_name == self.options.primary_provider => {
                let connection_string =
                    derive_server_connection(template_key, &template.connection_string, name)?;
                debug!(name, template = template_key, "Derived connection settings from template");
                Ok(ResolvedEntry::new(
                    ConnectionSettings::from_entry(
                        name,
                        ConnectionEntry::new(connection_string, template.provider_name),
                    ),
                    SettingsOrigin::Conventional,
                ))
            }
            Some(template) => {
                let message = format!(
                    "provider '{}' is not '{}'",
                    template.provider_name, self.options.primary_provider
                );
                if self.options.strict {
                    return Err(DbSettingsError::configuration(template_key, message));
                }
                warn!(
                    name,
                    template = template_key,
                    provider = %template.provider_name,
                    "Template provider unsupported, using embedded database file"
                );
                Ok(self.embedded_fallback(name))
            }
            None => {
                if self.options.strict {
                    return Err(DbSettingsError::configuration(
                        template_key,
                        "template entry not found",
                    ));
                }
                debug!(name, template = template_key, "No template entry, using embedded database file");
                Ok(self.embedded_fallback(name))
            }
        }
    }

    fn embedded_fallback(&self, name: &str) -> ResolvedEntry {
        let mut builder = ConnectionStringBuilder::new();
        builder.set_data_source(format!("{}.{}", name, self.options.embedded_extension));
        ResolvedEntry::new(
            ConnectionSettings::from_entry(
                name,
                ConnectionEntry::new(builder.to_string(), self.options.embedded_provider.clone()),
            ),
            SettingsOrigin::EmbeddedFallback,
        )
    }
}

/// Build a connection string addressing `catalog` on the template's server.
///
/// Keeps the template's data source and authentication mode; credentials are
/// carried over only for non-integrated authentication.
pub fn derive_server_connection(
    template_key: &str,
    template_connection_string: &str,
    catalog: &str,
) -> Result<String> {
    let template = ConnectionStringBuilder::parse(template_connection_string)
        .map_err(|e| DbSettingsError::configuration(template_key, e.to_string()))?;

    let data_source = template
        .data_source()
        .filter(|ds| !ds.is_empty())
        .ok_or_else(|| DbSettingsError::configuration(template_key, "missing Data Source"))?;
    let integrated = template
        .integrated_security()
        .map_err(|e| DbSettingsError::configuration(template_key, e.to_string()))?;

    let mut derived = ConnectionStringBuilder::new();
    derived.set_data_source(data_source);
    derived.set_initial_catalog(catalog);
    derived.set_integrated_security(integrated);
    if !integrated {
        if let Some(user) = template.user_id() {
            derived.set_user_id(user);
        }
        if let Some(password) = template.password() {
            derived.set_password(password);
        }
    }

    Ok(derived.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LOCAL_SERVER, PROVIDER_SQL_CE, PROVIDER_SQL_CLIENT};
    use crate::source::MemorySource;

    fn sql_server_source() -> MemorySource {
        MemorySource::new().with_entry(
            LOCAL_SERVER,
            "Data Source=.\\SQLExpress;Integrated Security=True",
            PROVIDER_SQL_CLIENT,
        )
    }

    #[test]
    fn test_derive_integrated_security() {
        let cs = derive_server_connection(
            LOCAL_SERVER,
            "Server=db01;Database=master;Trusted_Connection=yes;User ID=ignored",
            "Orders",
        )
        .unwrap();
        assert_eq!(
            cs,
            "Data Source=db01;Initial Catalog=Orders;Integrated Security=True"
        );
    }

    #[test]
    fn test_derive_carries_credentials() {
        let cs = derive_server_connection(
            LOCAL_SERVER,
            "Data Source=db01;Initial Catalog=master;User ID=app;Password=s3cret",
            "Orders",
        )
        .unwrap();
        assert_eq!(
            cs,
            "Data Source=db01;Initial Catalog=Orders;Integrated Security=False;User ID=app;Password=s3cret"
        );
    }

    #[test]
    fn test_derive_rejects_malformed_template() {
        let err = derive_server_connection(LOCAL_SERVER, "Data Source", "Orders").unwrap_err();
        assert!(
            matches!(err, DbSettingsError::Configuration { ref key, .. } if key == LOCAL_SERVER)
        );

        let err =
            derive_server_connection(LOCAL_SERVER, "Integrated Security=True", "Orders").unwrap_err();
        assert!(err.to_string().contains("missing Data Source"));
    }

    #[test]
    fn test_resolve_uses_template() {
        let registry = SettingsRegistry::new(sql_server_source());
        let entry = registry.resolve_entry("Orders").unwrap();

        assert_eq!(entry.origin, SettingsOrigin::Conventional);
        assert_eq!(entry.settings.name(), "Orders");
        assert_eq!(entry.settings.provider_name(), PROVIDER_SQL_CLIENT);
        assert_eq!(
            entry.settings.connection_string(),
            "Data Source=.\\SQLExpress;Initial Catalog=Orders;Integrated Security=True"
        );
    }

    #[test]
    fn test_resolve_embedded_fallback() {
        let registry = SettingsRegistry::new(MemorySource::new());
        let settings = registry.resolve("Orders").unwrap();

        assert_eq!(settings.provider_name(), PROVIDER_SQL_CE);
        assert_eq!(settings.connection_string(), "Data Source=Orders.sdf");
        assert_eq!(registry.origin("Orders"), Some(SettingsOrigin::EmbeddedFallback));
    }

    #[test]
    fn test_wrong_provider_template_falls_back() {
        let source = MemorySource::new().with_entry(LOCAL_SERVER, "Data Source=x", "Npgsql");
        let registry = SettingsRegistry::new(source);
        let settings = registry.resolve("Orders").unwrap();
        assert_eq!(settings.provider_name(), PROVIDER_SQL_CE);
    }

    #[test]
    fn test_strict_mode_fails_without_usable_template() {
        let registry = SettingsRegistry::with_options(
            MemorySource::new(),
            RegistryOptions::default().strict(true),
        );
        let err = registry.resolve("Orders").unwrap_err();
        assert!(matches!(err, DbSettingsError::Configuration { .. }));
        assert!(registry.get("Orders").is_none());
        assert!(registry.is_empty());

        let source = MemorySource::new().with_entry(LOCAL_SERVER, "Data Source=x", "Npgsql");
        let registry =
            SettingsRegistry::with_options(source, RegistryOptions::default().strict(true));
        let err = registry.resolve("Orders").unwrap_err();
        assert!(err.to_string().contains("Npgsql"));
    }

    #[test]
    fn test_failed_resolution_leaves_no_slot() {
        let registry = SettingsRegistry::with_options(
            MemorySource::new(),
            RegistryOptions::default().strict(true),
        );
        for name in ["A", "B", "C"] {
            assert!(registry.resolve(name).is_err());
        }
        assert!(registry.read_slots().is_empty());

        registry.register("A", "Data Source=a", "p").unwrap();
        assert_eq!(registry.read_slots().len(), 1);
        assert_eq!(registry.resolve("A").unwrap().provider_name(), "p");
    }

    #[test]
    fn test_custom_template_key() {
        let source = MemorySource::new().with_entry(
            "Primary",
            "Data Source=db02;Integrated Security=SSPI",
            PROVIDER_SQL_CLIENT,
        );
        let registry =
            SettingsRegistry::with_options(source, RegistryOptions::default().with_template("Primary"));
        let settings = registry.resolve("Billing").unwrap();
        assert_eq!(
            settings.connection_string(),
            "Data Source=db02;Initial Catalog=Billing;Integrated Security=True"
        );
    }

    #[test]
    fn test_empty_name_is_a_valid_key() {
        let registry = SettingsRegistry::new(MemorySource::new());
        let settings = registry.resolve("").unwrap();
        assert_eq!(settings.name(), "");
        assert_eq!(settings.connection_string(), "Data Source=.sdf");
    }

    #[test]
    fn test_resolve_opt_rejects_absent_name() {
        let registry = SettingsRegistry::new(MemorySource::new());
        let err = registry.resolve_opt(None).unwrap_err();
        assert!(matches!(err, DbSettingsError::InvalidArgument { field: "name" }));
        assert!(registry.resolve_opt(Some("Orders")).is_ok());
    }

    #[test]
    fn test_register_replaces_binding() {
        let registry = SettingsRegistry::new(MemorySource::new());
        let first = registry.register("X", "Data Source=a", "p1").unwrap();
        let second = registry.register("X", "Data Source=b", "p2").unwrap();

        assert_eq!(first.connection_string(), "Data Source=a");
        let resolved = registry.resolve("X").unwrap();
        assert!(Arc::ptr_eq(&resolved, &second));
        assert_eq!(registry.origin("X"), Some(SettingsOrigin::Registered));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_resolved_is_a_snapshot() {
        let registry = SettingsRegistry::new(sql_server_source());
        registry.resolve("A").unwrap();
        registry.register("B", "Data Source=b", "p").unwrap();

        let mut listed = registry.list_resolved();
        assert_eq!(listed.len(), 2);
        listed.clear();

        registry.resolve("C").unwrap();
        assert_eq!(listed.len(), 0);
        assert_eq!(registry.list_resolved().len(), 3);
    }
}
