// ModKit - Plugin Loader
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Plugin discovery and lifecycle
//!
//! ```text
//! Unloaded --ok--> Loaded --onEnable ok--> Enabled --disable--> Disabled
//!    |               |                        ^                    |
//!    v               +--onEnable err--> EnableFailed <---enable----+
//! LoadFailed
//! ```
//!
//! All transitions happen with the registry locked, so lifecycle changes are
//! serialised. Plugins hold no handle to the loader and cannot start a
//! transition from inside a hook.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::api::{self as lua_api, PluginContext};
use super::error::{Hook, PluginError};
use super::metadata::{HeaderFields, parse_header};
use super::registry::{PluginInfo, PluginRecord, PluginRegistry, PluginState};
use super::sandbox::{PluginInstance, create_secure_lua_state, redirect_print};
use crate::api::ModApi;
use crate::config::PLUGIN_SUFFIX;
use crate::core::logger::PluginLogger;
use crate::events::{EventBus, RuntimeEvent};
use crate::storage::{ConfigDocument, ConfigStore};
use crate::{log_debug, log_info, log_warn};

/// Counts from one full reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub discovered: usize,
    pub loaded: usize,
    pub failed: usize,
    pub enabled: usize,
}

/// Result of [`PluginLoader::set_plugin_enabled`]
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    /// State after the toggle; `None` if no such plugin is loaded
    pub state: Option<PluginState>,
    /// Error raised by the hook that ran, if any
    pub hook_error: Option<String>,
    /// Whether the settings document was written
    pub persisted: bool,
}

pub struct PluginLoader {
    plugin_dir: PathBuf,
    config: ConfigStore,
    api: Arc<ModApi>,
    registry: Mutex<PluginRegistry>,
}

impl PluginLoader {
    pub fn new(plugin_dir: impl Into<PathBuf>, config: ConfigStore, api: Arc<ModApi>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            config,
            api,
            registry: Mutex::new(PluginRegistry::new()),
        }
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    fn bus(&self) -> &EventBus {
        self.api.bus()
    }

    fn config_file(&self) -> String {
        self.config.path().display().to_string()
    }

    /// Plugin file names in the plugin directory, sorted
    ///
    /// A missing directory is created and yields no plugins.
    pub fn discover(&self) -> io::Result<Vec<String>> {
        if !self.plugin_dir.exists() {
            log_info!("Creating plugins directory {}", self.plugin_dir.display());
            fs::create_dir_all(&self.plugin_dir)?;
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.plugin_dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(PLUGIN_SUFFIX) {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Discard every instance and load all plugins again
    ///
    /// Runs `onLoad` for each plugin and `onEnable` for those listed in the
    /// settings document. Failures are isolated per plugin.
    pub async fn reload_all(&self) -> LoadSummary {
        let mut registry = self.registry.lock().await;

        let purged: usize = registry
            .drain()
            .iter()
            .map(|record| record.subscriptions.purge(self.bus()))
            .sum();
        if purged > 0 {
            log_debug!("Removed {} event subscription(s) of previous plugin instances", purged);
        }

        let config = self.read_config(|file, error| RuntimeEvent::ConfigReadError { file, error });

        let files = match self.discover() {
            Ok(files) => files,
            Err(e) => {
                log_warn!("Error reading plugin directory {}: {}", self.plugin_dir.display(), e);
                self.bus().publish(RuntimeEvent::PluginDirectoryReadError {
                    directory: self.plugin_dir.display().to_string(),
                    error: e.to_string(),
                });
                return LoadSummary::default();
            }
        };

        let mut summary = LoadSummary {
            discovered: files.len(),
            ..Default::default()
        };

        for file in files {
            let record = self.load_plugin(&file, config.is_enabled(&file)).await;
            match record.state {
                PluginState::LoadFailed => summary.failed += 1,
                PluginState::Enabled => {
                    summary.loaded += 1;
                    summary.enabled += 1;
                }
                _ => summary.loaded += 1,
            }
            registry.insert(record);
        }

        log_info!(
            "Loaded {} plugin(s), {} enabled, {} failed",
            summary.loaded,
            summary.enabled,
            summary.failed
        );
        summary
    }

    /// Enable or disable one plugin and persist the choice
    ///
    /// The settings document is read fresh and written exactly once, even if
    /// the plugin is unknown or its hook fails.
    pub async fn set_plugin_enabled(&self, file: &str, enabled: bool) -> ToggleOutcome {
        let mut registry = self.registry.lock().await;

        let mut config = self.read_config(|file, error| RuntimeEvent::PluginConfigReadError {
            file,
            error,
            context: "setPluginEnabled".to_string(),
        });
        config.set_enabled(file, enabled);

        let mut hook_error = None;
        let state = match registry.get_mut(file) {
            Some(record) => {
                let result = match (enabled, record.state) {
                    (true, PluginState::Loaded | PluginState::Disabled | PluginState::EnableFailed) => {
                        self.enable(record).await
                    }
                    (false, PluginState::Enabled | PluginState::EnableFailed) => {
                        self.disable(record).await
                    }
                    _ => Ok(()),
                };
                hook_error = result.err();
                Some(record.state)
            }
            None => None,
        };

        let persisted = match self.config.save(&config) {
            Ok(()) => {
                log_info!(
                    "Plugin \"{}\" {}",
                    file,
                    if enabled { "enabled" } else { "disabled" }
                );
                self.bus().publish(RuntimeEvent::PluginConfigUpdated {
                    name: file.to_string(),
                    enabled,
                });
                true
            }
            Err(e) => {
                log_warn!("Error saving settings: {}", e);
                self.bus().publish(RuntimeEvent::PluginConfigWriteError {
                    file: self.config_file(),
                    error: e.to_string(),
                });
                false
            }
        };

        ToggleOutcome {
            state,
            hook_error,
            persisted,
        }
    }

    /// Snapshot of every known plugin, sorted by file name
    pub async fn plugins(&self) -> Vec<PluginInfo> {
        let config = self.config.read().ok().flatten().unwrap_or_default();
        let registry = self.registry.lock().await;
        registry
            .iter()
            .map(|record| record.info(config.is_enabled(&record.file)))
            .collect()
    }

    pub async fn state(&self, file: &str) -> Option<PluginState> {
        self.registry.lock().await.get(file).map(|record| record.state)
    }

    /// Disable active plugins without touching the settings, then drop them
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        for record in registry.iter_mut() {
            if matches!(record.state, PluginState::Enabled | PluginState::EnableFailed) {
                let _ = self.disable(record).await;
            }
        }
        for record in registry.drain() {
            record.subscriptions.purge(self.bus());
        }
    }

    /// Fresh read of the settings; unusable files degrade to the default
    fn read_config<F>(&self, on_error: F) -> ConfigDocument
    where
        F: FnOnce(String, String) -> RuntimeEvent,
    {
        match self.config.read() {
            Ok(Some(document)) => document,
            Ok(None) => ConfigDocument::default(),
            Err(e) => {
                log_warn!("Failed to read settings, using defaults: {}", e);
                self.bus().publish(on_error(self.config_file(), e.to_string()));
                ConfigDocument::default()
            }
        }
    }

    async fn load_plugin(&self, file: &str, enabled: bool) -> PluginRecord {
        let id = file.strip_suffix(PLUGIN_SUFFIX).unwrap_or(file);
        let path = self.plugin_dir.join(file);

        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(source) => {
                let mut record = PluginRecord::new(file, id, HeaderFields::default().into_metadata(file));
                self.fail_load(&mut record, PluginError::Io { path, source });
                return record;
            }
        };

        let header = parse_header(&source);
        let mut record = PluginRecord::new(file, id, header.clone().into_metadata(file));

        let instance = match self.instantiate(&record, &source) {
            Ok(instance) => instance,
            Err(e) => {
                self.fail_load(&mut record, e);
                return record;
            }
        };
        record.metadata = instance.declared_metadata().or(header).into_metadata(file);
        record.state = PluginState::Loaded;
        record.instance = Some(instance);

        if let Err(e) = self.rescope(&mut record) {
            self.fail_load(&mut record, e);
            return record;
        }

        self.run_on_load(&mut record).await;

        if enabled {
            let _ = self.enable(&mut record).await;
        }

        self.bus().publish(RuntimeEvent::PluginLoaded {
            id: file.to_string(),
            name: record.name().to_string(),
            plugin: serde_json::to_value(&record.metadata).unwrap_or_default(),
        });
        record.logger.debug("Plugin processed");
        record
    }

    fn instantiate(&self, record: &PluginRecord, source: &str) -> Result<PluginInstance, PluginError> {
        let lua = create_secure_lua_state(&record.logger)?;
        PluginInstance::evaluate(lua, source, &record.file)
    }

    /// Scope the logger by the final plugin name and inject `api`/`logger`
    fn rescope(&self, record: &mut PluginRecord) -> Result<(), PluginError> {
        record.logger = PluginLogger::new(record.metadata.name.clone());
        let Some(instance) = record.instance.as_ref() else {
            return Ok(());
        };

        redirect_print(instance.lua(), &record.logger)?;
        let ctx = PluginContext {
            plugin_id: record.id.clone(),
            api: self.api.clone(),
            logger: record.logger.clone(),
            subscriptions: record.subscriptions.clone(),
        };
        lua_api::install(instance.lua(), instance.module(), &ctx)?;
        Ok(())
    }

    fn fail_load(&self, record: &mut PluginRecord, error: PluginError) {
        let message = error.to_string();
        log_warn!("Plugin load error: {}: {}", record.file, message);
        record.state = PluginState::LoadFailed;
        record.instance = None;
        record.last_error = Some(message.clone());
        self.bus().publish(RuntimeEvent::PluginLoadFailed {
            id: record.file.clone(),
            error: message,
            reason: error.reason().to_string(),
        });
    }

    async fn run_on_load(&self, record: &mut PluginRecord) {
        let Some(instance) = record.instance.as_ref() else {
            return;
        };
        if let Err(e) = instance.call_hook(Hook::OnLoad).await {
            let message = e.to_string();
            record.logger.error("Error in onLoad", Some(&message));
            record.last_error = Some(message.clone());
            self.bus().publish(RuntimeEvent::PluginOnLoadFailed {
                id: record.file.clone(),
                name: record.name().to_string(),
                error: message,
            });
        }
    }

    async fn enable(&self, record: &mut PluginRecord) -> Result<(), String> {
        let Some(instance) = record.instance.as_ref() else {
            return Err(format!("{} is not loaded", record.file));
        };

        match instance.call_hook(Hook::OnEnable).await {
            Ok(_) => {
                record.state = PluginState::Enabled;
                record.last_error = None;
                self.bus().publish(RuntimeEvent::PluginEnabled {
                    id: record.file.clone(),
                    name: record.name().to_string(),
                });
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                record.logger.error("Error in onEnable", Some(&message));
                record.state = PluginState::EnableFailed;
                record.last_error = Some(message.clone());
                self.bus().publish(RuntimeEvent::PluginEnableFailed {
                    id: record.file.clone(),
                    name: record.name().to_string(),
                    error: message.clone(),
                });
                Err(message)
            }
        }
    }

    /// Run `onDisable`; the plugin ends up Disabled even if the hook fails
    async fn disable(&self, record: &mut PluginRecord) -> Result<(), String> {
        let Some(instance) = record.instance.as_ref() else {
            return Err(format!("{} is not loaded", record.file));
        };

        let result = instance.call_hook(Hook::OnDisable).await;
        record.state = PluginState::Disabled;
        match result {
            Ok(_) => {
                self.bus().publish(RuntimeEvent::PluginDisabled {
                    id: record.file.clone(),
                    name: record.name().to_string(),
                });
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                record.logger.error("Error in onDisable", Some(&message));
                record.last_error = Some(message.clone());
                self.bus().publish(RuntimeEvent::PluginDisableFailed {
                    id: record.file.clone(),
                    name: record.name().to_string(),
                    error: message.clone(),
                });
                Err(message)
            }
        }
    }
}
