// ModKit - Persistent Config Store
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The single JSON settings document
//!
//! ```json
//! { "enabledPlugins": ["a.plugin.lua"], "activeTheme": "dark.theme.css" }
//! ```
//!
//! The file is human-editable, so loading validates it as a whole: either it
//! parses into a [`ConfigDocument`] or the fixed default is used instead.
//! A malformed file is never rewritten on load; the next save replaces it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Plugin file names enabled by the user. Entries for files that no
    /// longer exist are kept.
    pub enabled_plugins: BTreeSet<String>,
    #[serde(default)]
    pub active_theme: Option<String>,
}

impl ConfigDocument {
    pub fn is_enabled(&self, plugin_file: &str) -> bool {
        self.enabled_plugins.contains(plugin_file)
    }

    /// Set the enabled flag, returning whether the document changed
    pub fn set_enabled(&mut self, plugin_file: &str, enabled: bool) -> bool {
        if enabled {
            self.enabled_plugins.insert(plugin_file.to_string())
        } else {
            self.enabled_plugins.remove(plugin_file)
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outcome of loading the settings file
#[derive(Debug)]
pub enum ConfigLoad {
    /// The file existed and was valid
    Loaded(ConfigDocument),
    /// The file did not exist; the default was written
    Created(ConfigDocument),
    /// The file could not be used; the default applies in memory only
    Fallback {
        document: ConfigDocument,
        error: ConfigError,
    },
}

impl ConfigLoad {
    pub fn document(&self) -> &ConfigDocument {
        match self {
            Self::Loaded(document) | Self::Created(document) => document,
            Self::Fallback { document, .. } => document,
        }
    }

    pub fn into_document(self) -> ConfigDocument {
        match self {
            Self::Loaded(document) | Self::Created(document) => document,
            Self::Fallback { document, .. } => document,
        }
    }

    pub fn error(&self) -> Option<&ConfigError> {
        match self {
            Self::Fallback { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Reads and writes the settings document at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the file. `Ok(None)` if it does not exist
    pub fn read(&self) -> Result<Option<ConfigDocument>, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Fresh read with defaulting
    ///
    /// A missing file is created with the default document. An unreadable or
    /// invalid file yields [`ConfigLoad::Fallback`] and is left in place.
    pub fn load(&self) -> ConfigLoad {
        match self.read() {
            Ok(Some(document)) => {
                log_debug!(
                    "Loaded config from {} ({} enabled plugin(s))",
                    self.path.display(),
                    document.enabled_plugins.len()
                );
                ConfigLoad::Loaded(document)
            }
            Ok(None) => {
                let document = ConfigDocument::default();
                match self.save(&document) {
                    Ok(()) => {
                        log_info!("Created default config at {}", self.path.display());
                        ConfigLoad::Created(document)
                    }
                    Err(error) => {
                        log_warn!("Could not create default config: {}", error);
                        ConfigLoad::Fallback { document, error }
                    }
                }
            }
            Err(error) => {
                log_warn!("Using default config: {}", error);
                ConfigLoad::Fallback {
                    document: ConfigDocument::default(),
                    error,
                }
            }
        }
    }

    /// Write the whole document, replacing the file atomically
    pub fn save(&self, document: &ConfigDocument) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config").join("settings.json"))
    }

    #[test]
    fn test_first_run_creates_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let load = store.load();
        assert!(matches!(load, ConfigLoad::Created(_)));
        assert_eq!(*load.document(), ConfigDocument::default());

        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"enabledPlugins": [], "activeTheme": null}));

        assert!(matches!(store.load(), ConfigLoad::Loaded(_)));
    }

    #[test]
    fn test_malformed_file_falls_back_without_overwriting() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        let load = store.load();
        assert!(load.error().is_some());
        assert_eq!(*load.document(), ConfigDocument::default());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");

        store.save(load.document()).unwrap();
        assert!(matches!(store.load(), ConfigLoad::Loaded(_)));
    }

    #[test]
    fn test_partially_valid_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        for bad in [
            r#"{"enabledPlugins": ["a.plugin.lua", 3]}"#,
            r#"{"enabledPlugins": "a.plugin.lua"}"#,
            r#"{"activeTheme": "dark.css"}"#,
            r#"{"enabledPlugins": [], "activeTheme": 7}"#,
            r#"[]"#,
        ] {
            fs::write(store.path(), bad).unwrap();
            assert!(
                matches!(store.read(), Err(ConfigError::Parse { .. })),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_round_trip_and_optional_theme() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"enabledPlugins": ["b.plugin.lua"]}"#).unwrap();

        let mut document = store.read().unwrap().unwrap();
        assert!(document.is_enabled("b.plugin.lua"));
        assert_eq!(document.active_theme, None);

        assert!(document.set_enabled("a.plugin.lua", true));
        assert!(!document.set_enabled("a.plugin.lua", true));
        document.active_theme = Some("dark.theme.css".to_string());
        store.save(&document).unwrap();

        assert_eq!(store.read().unwrap(), Some(document));
        assert!(!store.path().with_extension("json.tmp").exists());
    }
}
