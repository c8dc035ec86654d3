//! Plugin registry: one record per discovered plugin file
//!
//! Records are keyed by file name and rebuilt from scratch on every full
//! reload. The registry is the only owner of plugin instances.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::api::SubscriptionLedger;
use super::metadata::Metadata;
use super::sandbox::PluginInstance;
use crate::core::logger::PluginLogger;

/// Lifecycle state of one plugin file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginState {
    Unloaded,
    LoadFailed,
    Loaded,
    EnableFailed,
    Enabled,
    Disabled,
}

impl PluginState {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginState::Unloaded => "unloaded",
            PluginState::LoadFailed => "loadFailed",
            PluginState::Loaded => "loaded",
            PluginState::EnableFailed => "enableFailed",
            PluginState::Enabled => "enabled",
            PluginState::Disabled => "disabled",
        }
    }

    /// Whether the plugin has an instance that hooks can run on
    pub fn is_instantiated(self) -> bool {
        !matches!(self, PluginState::Unloaded | PluginState::LoadFailed)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub struct PluginRecord {
    pub file: String,
    /// File name without the plugin suffix; scopes plugin data
    pub id: String,
    pub metadata: Metadata,
    pub state: PluginState,
    pub last_error: Option<String>,
    pub logger: PluginLogger,
    pub subscriptions: SubscriptionLedger,
    pub(crate) instance: Option<PluginInstance>,
}

impl PluginRecord {
    pub fn new(file: &str, id: &str, metadata: Metadata) -> Self {
        Self {
            file: file.to_string(),
            id: id.to_string(),
            logger: PluginLogger::new(metadata.name.clone()),
            metadata,
            state: PluginState::Unloaded,
            last_error: None,
            subscriptions: SubscriptionLedger::new(),
            instance: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn instance(&self) -> Option<&PluginInstance> {
        self.instance.as_ref()
    }

    pub fn info(&self, enabled: bool) -> PluginInfo {
        PluginInfo {
            file: self.file.clone(),
            id: self.id.clone(),
            metadata: self.metadata.clone(),
            state: self.state,
            enabled,
            last_error: self.last_error.clone(),
        }
    }
}

/// Snapshot of a plugin record for UIs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub file: String,
    pub id: String,
    #[serde(flatten)]
    pub metadata: Metadata,
    pub state: PluginState,
    /// Whether the settings document lists this plugin
    pub enabled: bool,
    pub last_error: Option<String>,
}

#[derive(Default)]
pub struct PluginRegistry {
    records: BTreeMap<String, PluginRecord>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: PluginRecord) {
        self.records.insert(record.file.clone(), record);
    }

    pub fn get(&self, file: &str) -> Option<&PluginRecord> {
        self.records.get(file)
    }

    pub fn get_mut(&mut self, file: &str) -> Option<&mut PluginRecord> {
        self.records.get_mut(file)
    }

    /// Records sorted by file name
    pub fn iter(&self) -> impl Iterator<Item = &PluginRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PluginRecord> {
        self.records.values_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove every record, handing them back
    pub fn drain(&mut self) -> Vec<PluginRecord> {
        std::mem::take(&mut self.records).into_values().collect()
    }
}
