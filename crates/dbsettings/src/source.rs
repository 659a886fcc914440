//! External configuration sources consulted by the registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::settings::ConnectionEntry;

/// Read-only lookup of explicitly configured connection entries.
///
/// Lookups are synchronous and expected to be cheap (already-loaded
/// configuration); the registry calls `lookup` at most once per name and
/// once per name for the template entry.
pub trait ConnectionSource: Send + Sync {
    /// Find the entry configured under `name`, if any.
    fn lookup(&self, name: &str) -> Option<ConnectionEntry>;
}

impl<S: ConnectionSource + ?Sized> ConnectionSource for Arc<S> {
    fn lookup(&self, name: &str) -> Option<ConnectionEntry> {
        (**self).lookup(name)
    }
}

impl<S: ConnectionSource + ?Sized> ConnectionSource for &S {
    fn lookup(&self, name: &str) -> Option<ConnectionEntry> {
        (**self).lookup(name)
    }
}

impl ConnectionSource for HashMap<String, ConnectionEntry> {
    fn lookup(&self, name: &str) -> Option<ConnectionEntry> {
        self.get(name).cloned()
    }
}

/// In-memory source for programmatic composition and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: HashMap<String, ConnectionEntry>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry.
    pub fn with_entry(
        mut self,
        name: impl Into<String>,
        connection_string: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        self.insert(name, ConnectionEntry::new(connection_string, provider_name));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ConnectionEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl ConnectionSource for MemorySource {
    fn lookup(&self, name: &str) -> Option<ConnectionEntry> {
        self.entries.get(name).cloned()
    }
}
