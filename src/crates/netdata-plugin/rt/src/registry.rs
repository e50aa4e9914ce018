use std::collections::BTreeMap;

use parking_lot::RwLock;

/// Concurrency safe map of jobs keyed by their full name.
///
/// [`JobRegistry::range`] walks a snapshot, so callbacks may take as long as
/// they need (or touch the registry themselves) without holding the lock.
#[derive(Debug)]
pub struct JobRegistry<T> {
    entries: RwLock<BTreeMap<String, T>>,
}

impl<T> Default for JobRegistry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Clone> JobRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` unless `key` is taken. Returns whether it was inserted.
    pub fn put_if_not_exist(&self, key: &str, value: T) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value);
        true
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.read().get(key).cloned()
    }

    pub fn delete(&self, key: &str) -> Option<T> {
        self.entries.write().remove(key)
    }

    /// Visit entries in key order until `f` returns `false`.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&str, &T) -> bool,
    {
        let snapshot: Vec<(String, T)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, value) in &snapshot {
            if !f(key, value) {
                break;
            }
        }
    }

    /// Remove and return every entry.
    pub fn drain(&self) -> Vec<(String, T)> {
        std::mem::take(&mut *self.entries.write()).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
