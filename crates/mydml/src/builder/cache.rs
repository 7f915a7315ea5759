use super::writer::Built;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Rendered SQL per cache key.
///
/// Reads take the shared lock; the first writer for a key wins and later
/// writers get the stored entry back. Cloning takes a snapshot, so a cloned
/// builder never sees entries written by the original afterwards.
#[derive(Debug, Default)]
pub struct BuildCache {
    entries: RwLock<HashMap<String, Arc<Built>>>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Built>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store `built` under `key` unless an entry exists; returns the stored entry.
    pub fn insert(&self, key: &str, built: Arc<Built>) -> Arc<Built> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(key.to_string()).or_insert(built).clone()
    }

    pub fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Remove `key` and the variants derived from it (`key` + NUL + suffix).
    pub fn remove_variants(&self, key: &str) {
        let prefix = format!("{key}\u{0}");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|k, _| k != key && !k.starts_with(&prefix));
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl Clone for BuildCache {
    fn clone(&self) -> Self {
        let snapshot = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self {
            entries: RwLock::new(snapshot),
        }
    }
}
