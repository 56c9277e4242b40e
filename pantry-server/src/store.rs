//! Pluggable content storage for the embedded server.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

/// Result of storing one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Storage strategy behind the content API. Paths are `/`-separated and
/// have no leading slash.
pub trait DataStore: Send + Sync + fmt::Debug {
    fn put(&self, path: &str, body: Vec<u8>) -> PutOutcome;
    fn get(&self, path: &str) -> Option<Vec<u8>>;
    fn delete(&self, path: &str) -> bool;
    /// All stored paths, sorted.
    fn list(&self) -> Vec<String>;
}

/// Non-persistent store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStore for MemoryStore {
    fn put(&self, path: &str, body: Vec<u8>) -> PutOutcome {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.insert(path.to_string(), body) {
            None => PutOutcome::Created,
            Some(previous) if Some(&previous) == entries.get(path) => PutOutcome::Unchanged,
            Some(_) => PutOutcome::Updated,
        }
    }

    fn get(&self, path: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(path).cloned()
    }

    fn delete(&self, path: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(path).is_some()
    }

    fn list(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }
}
