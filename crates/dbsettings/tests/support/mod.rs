//! Shared test helpers: a call-counting configuration source.

#![allow(dead_code)]

use dbsettings::{ConnectionEntry, ConnectionSource, MemorySource};
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Wraps a `MemorySource`, counting lookups and optionally delaying them.
pub struct SpySource {
    inner: MemorySource,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl SpySource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            delays: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Number of lookups issued for `name` so far (counted before any delay).
    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl ConnectionSource for SpySource {
    fn lookup(&self, name: &str) -> Option<ConnectionEntry> {
        *self.calls.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delays.get(name) {
            thread::sleep(*delay);
        }
        self.inner.lookup(name)
    }
}
