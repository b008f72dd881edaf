//! Label cache for the classifier. Append-only; nothing is ever evicted.

use crate::state::{StateManager, StoreError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub trait LabelCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, label: &str);
}

/// Cache key for an event: `title|description`.
pub fn cache_key(title: &str, description: Option<&str>) -> String {
    format!("{}|{}", title, description.unwrap_or("")).trim().to_string()
}

#[derive(Default)]
pub struct MemoryLabelCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LabelCache for MemoryLabelCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, label: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), label.to_string());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedLabel {
    pub key: String,
    pub label: String,
}

/// File-backed cache. Loaded once; every put rewrites the file.
pub struct JsonLabelCache {
    state: StateManager,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonLabelCache {
    /// An unreadable cache file starts the cache fresh.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let state = StateManager::new(path);
        let entries = match state.load::<CachedLabel>() {
            Ok(items) => items.into_iter().map(|c| (c.key, c.label)).collect(),
            Err(e) => {
                warn!("Could not read label cache {:?} ({}), starting fresh", state.path(), e);
                HashMap::new()
            }
        };
        Self { state, entries: Mutex::new(entries) }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let mut items: Vec<CachedLabel> = entries
            .iter()
            .map(|(key, label)| CachedLabel { key: key.clone(), label: label.clone() })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        self.state.save(&items)
    }
}

impl LabelCache for JsonLabelCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, label: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.insert(key.to_string(), label.to_string());
        if let Err(e) = self.persist(&entries) {
            warn!("Failed to write event classification cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("Jazz Night", Some("Live trio")), "Jazz Night|Live trio");
        assert_eq!(cache_key("Jazz Night", None), "Jazz Night|");
    }

    #[test]
    fn test_json_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = JsonLabelCache::open(&path);
        assert_eq!(cache.get("a|b"), None);
        cache.put("a|b", "Music");

        let reopened = JsonLabelCache::open(&path);
        assert_eq!(reopened.get("a|b").as_deref(), Some("Music"));
    }

    #[test]
    fn test_corrupt_cache_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = JsonLabelCache::open(&path);
        assert_eq!(cache.get("a|b"), None);
        cache.put("a|b", "Music");
        assert_eq!(JsonLabelCache::open(&path).get("a|b").as_deref(), Some("Music"));
    }
}
