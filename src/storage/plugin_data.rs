//! Per-plugin JSON data files
//!
//! One pretty-printed file per plugin id. Every save replaces the whole
//! file; merging is up to the plugin. None of these operations fail: I/O
//! and parse errors are logged and degrade to `false` or the default value.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::log_error;

#[derive(Debug, Clone)]
pub struct PluginDataStore {
    dir: PathBuf,
}

impl PluginDataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Data file for `plugin_id`, or None if the id could escape the directory
    pub fn path_for(&self, plugin_id: &str) -> Option<PathBuf> {
        let valid = !plugin_id.is_empty()
            && plugin_id != "."
            && !plugin_id.contains("..")
            && !plugin_id.contains(['/', '\\', '\0']);
        valid.then(|| self.dir.join(format!("{}.json", plugin_id)))
    }

    pub fn save(&self, plugin_id: &str, data: &Value) -> bool {
        match self.try_save(plugin_id, data) {
            Ok(()) => true,
            Err(e) => {
                log_error!("Failed to save data for plugin {}: {}", plugin_id, e);
                false
            }
        }
    }

    /// Stored value, or `default` when there is none
    ///
    /// When no file exists yet, `default` is written so the plugin finds it
    /// next time.
    pub fn load(&self, plugin_id: &str, default: Value) -> Value {
        let Some(path) = self.path_for(plugin_id) else {
            log_error!("Failed to load data for plugin {}: invalid plugin id", plugin_id);
            return default;
        };

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(e) => {
                    log_error!("Failed to load data for plugin {}: {}", plugin_id, e);
                    default
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.save(plugin_id, &default);
                default
            }
            Err(e) => {
                log_error!("Failed to load data for plugin {}: {}", plugin_id, e);
                default
            }
        }
    }

    /// Remove the data file. Deleting data that does not exist succeeds
    pub fn delete(&self, plugin_id: &str) -> bool {
        let Some(path) = self.path_for(plugin_id) else {
            log_error!("Failed to delete data for plugin {}: invalid plugin id", plugin_id);
            return false;
        };

        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                log_error!("Failed to delete data for plugin {}: {}", plugin_id, e);
                false
            }
        }
    }

    fn try_save(&self, plugin_id: &str, data: &Value) -> io::Result<()> {
        let path = self.path_for(plugin_id).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid plugin id")
        })?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(data)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = PluginDataStore::new(dir.path().join("data"));
        let value = json!({"count": 3, "tags": ["x", "y"], "nested": {"ok": true}});

        assert!(store.save("counter", &value));
        assert_eq!(store.load("counter", json!({})), value);

        let on_disk = fs::read_to_string(dir.path().join("data/counter.json")).unwrap();
        assert!(on_disk.contains('\n'), "data files are pretty-printed");
    }

    #[test]
    fn test_load_missing_writes_default() {
        let dir = TempDir::new().unwrap();
        let store = PluginDataStore::new(dir.path());

        assert_eq!(store.load("fresh", json!({"count": 0})), json!({"count": 0}));
        assert!(dir.path().join("fresh.json").exists());
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = PluginDataStore::new(dir.path());
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        assert_eq!(store.load("broken", json!([])), json!([]));
        assert_eq!(fs::read_to_string(dir.path().join("broken.json")).unwrap(), "{");
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = PluginDataStore::new(dir.path());

        assert!(store.delete("never-saved"));
        store.save("gone", &json!(1));
        assert!(store.delete("gone"));
        assert_eq!(store.load("gone", json!(null)), json!(null));
    }

    #[test]
    fn test_ids_cannot_escape_directory() {
        let dir = TempDir::new().unwrap();
        let store = PluginDataStore::new(dir.path().join("data"));

        for id in ["", "..", "../settings", "a/b", "a\\b"] {
            assert!(store.path_for(id).is_none(), "accepted {:?}", id);
            assert!(!store.save(id, &json!(1)));
        }
        assert!(store.path_for("hello-world").is_some());
    }
}
