// ModKit - Theme Manager
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::ThemeError;
use super::sink::StyleSink;
use crate::config::{THEME_ELEMENT_ID, THEME_SUFFIXES};
use crate::events::{EventBus, RuntimeEvent};
use crate::plugins::metadata::{Metadata, parse_header};
use crate::storage::{ConfigDocument, ConfigStore};
use crate::{log_info, log_warn};

/// A discovered theme file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRecord {
    pub file: String,
    #[serde(flatten)]
    pub metadata: Metadata,
}

/// Result of [`ThemeManager::set_active_theme`]
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeChange {
    /// Theme active afterwards
    pub active: Option<String>,
    pub apply_error: Option<String>,
    /// Whether the settings document was written
    pub persisted: bool,
}

pub struct ThemeManager {
    theme_dir: PathBuf,
    config: ConfigStore,
    sink: Arc<dyn StyleSink>,
    bus: Arc<EventBus>,
    /// File name of the applied theme
    active: Mutex<Option<String>>,
}

impl ThemeManager {
    pub fn new(
        theme_dir: impl Into<PathBuf>,
        config: ConfigStore,
        sink: Arc<dyn StyleSink>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            theme_dir: theme_dir.into(),
            config,
            sink,
            bus,
            active: Mutex::new(None),
        }
    }

    pub fn theme_dir(&self) -> &Path {
        &self.theme_dir
    }

    pub fn active_theme(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Theme files in the theme directory, sorted by file name
    pub fn discover(&self) -> io::Result<Vec<ThemeRecord>> {
        if !self.theme_dir.exists() {
            log_info!("Creating themes directory {}", self.theme_dir.display());
            fs::create_dir_all(&self.theme_dir)?;
            return Ok(Vec::new());
        }

        let mut themes = Vec::new();
        for entry in fs::read_dir(&self.theme_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !THEME_SUFFIXES.iter().any(|suffix| file.ends_with(suffix)) {
                continue;
            }

            let header = fs::read_to_string(&path)
                .map(|css| parse_header(&css))
                .unwrap_or_default();
            themes.push(ThemeRecord {
                metadata: header.into_metadata(&file),
                file,
            });
        }
        themes.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(themes)
    }

    /// Apply the theme named in the settings, if any
    pub fn apply_configured(&self) -> Option<String> {
        let name = match self.config.read() {
            Ok(Some(document)) => document.active_theme?,
            Ok(None) => return None,
            Err(e) => {
                log_warn!("Failed to read active theme from config: {}", e);
                self.bus.publish(RuntimeEvent::ThemeConfigReadError {
                    file: self.config_file(),
                    error: e.to_string(),
                    context: "applyConfigured".to_string(),
                });
                return None;
            }
        };

        let mut active = self.lock();
        let mut events: Vec<RuntimeEvent> = self.remove_element(&mut active).into_iter().collect();
        match self.apply(&name) {
            Ok(()) => {
                log_info!("Loaded theme: {}", name);
                *active = Some(name.clone());
                events.push(RuntimeEvent::ThemeApplied { name });
            }
            Err(e) => {
                log_warn!("Failed to load theme {}: {}", name, e);
                events.push(RuntimeEvent::ThemeLoadFailed {
                    name,
                    error: e.to_string(),
                });
            }
        }
        let result = active.clone();
        drop(active);

        for event in events {
            self.bus.publish(event);
        }
        result
    }

    /// Switch to `name`, or to no theme, and persist the choice
    ///
    /// The previous theme's element is always removed first, so at most one
    /// theme element exists afterwards. A theme that fails to apply leaves no
    /// theme active.
    pub fn set_active_theme(&self, name: Option<&str>) -> ThemeChange {
        let mut events = Vec::new();

        let mut config = match self.config.read() {
            Ok(document) => document.unwrap_or_default(),
            Err(e) => {
                log_warn!("Couldn't load settings for theme update, using default: {}", e);
                events.push(RuntimeEvent::ThemeConfigReadError {
                    file: self.config_file(),
                    error: e.to_string(),
                    context: "setActiveTheme".to_string(),
                });
                ConfigDocument::default()
            }
        };

        let mut active = self.lock();
        events.extend(self.remove_element(&mut active));

        let mut apply_error = None;
        if let Some(name) = name {
            match self.apply(name) {
                Ok(()) => {
                    *active = Some(name.to_string());
                    events.push(RuntimeEvent::ThemeApplied {
                        name: name.to_string(),
                    });
                }
                Err(e) => {
                    log_warn!("Error applying theme {}: {}", name, e);
                    apply_error = Some(e.to_string());
                    events.push(RuntimeEvent::ThemeApplyFailed {
                        name: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        config.active_theme = active.clone();
        let persisted = match self.config.save(&config) {
            Ok(()) => {
                match active.as_deref() {
                    Some(theme) => log_info!("Theme \"{}\" applied", theme),
                    None => log_info!("Theme removed/cleared"),
                }
                true
            }
            Err(e) => {
                log_warn!("Error updating theme config: {}", e);
                events.push(RuntimeEvent::ThemeConfigWriteError {
                    file: self.config_file(),
                    error: e.to_string(),
                });
                false
            }
        };
        let result = active.clone();
        drop(active);

        for event in events {
            self.bus.publish(event);
        }

        ThemeChange {
            active: result,
            apply_error,
            persisted,
        }
    }

    /// Remove the applied theme without touching the settings
    pub fn remove_active(&self) -> Option<String> {
        let mut active = self.lock();
        let previous = active.clone();
        let event = self.remove_element(&mut active);
        drop(active);

        if let Some(event) = event {
            self.bus.publish(event);
        }
        previous
    }

    /// Remove every theme element and clear `active`
    ///
    /// Returns the `themeRemoved` event to publish once the lock is released.
    fn remove_element(&self, active: &mut Option<String>) -> Option<RuntimeEvent> {
        let previous = active.take();
        let mut removed = false;
        while self.sink.remove(THEME_ELEMENT_ID) {
            removed = true;
        }
        match previous {
            Some(name) if removed => Some(RuntimeEvent::ThemeRemoved { name }),
            _ => None,
        }
    }

    fn apply(&self, name: &str) -> Result<(), ThemeError> {
        let path = self.theme_path(name)?;
        let css = match fs::read_to_string(&path) {
            Ok(css) => css,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ThemeError::NotFound),
            Err(source) => return Err(ThemeError::Io { path, source }),
        };
        self.sink.insert(THEME_ELEMENT_ID, &css)
    }

    fn theme_path(&self, name: &str) -> Result<PathBuf, ThemeError> {
        let valid = !name.is_empty() && !name.contains("..") && !name.contains(['/', '\\']);
        if valid {
            Ok(self.theme_dir.join(name))
        } else {
            Err(ThemeError::InvalidName(name.to_string()))
        }
    }

    fn config_file(&self) -> String {
        self.config.path().display().to_string()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}
