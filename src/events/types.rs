//! Runtime event names and payloads
//!
//! Event names and payload field names are a contract that plugins and UI
//! layers rely on; they are camelCase on the wire.

use serde_json::{Value, json};

/// Wire names of every event the runtime emits
pub mod names {
    pub const PLUGIN_LOAD_FAILED: &str = "pluginLoadFailed";
    pub const PLUGIN_LOADED: &str = "pluginLoaded";
    pub const PLUGIN_ON_LOAD_FAILED: &str = "pluginOnLoadFailed";
    pub const PLUGIN_ENABLED: &str = "pluginEnabled";
    pub const PLUGIN_ENABLE_FAILED: &str = "pluginEnableFailed";
    pub const PLUGIN_DISABLED: &str = "pluginDisabled";
    pub const PLUGIN_DISABLE_FAILED: &str = "pluginDisableFailed";
    pub const PLUGIN_CONFIG_UPDATED: &str = "pluginConfigUpdated";
    pub const PLUGIN_CONFIG_READ_ERROR: &str = "pluginConfigReadError";
    pub const PLUGIN_CONFIG_WRITE_ERROR: &str = "pluginConfigWriteError";
    pub const PLUGIN_DIRECTORY_READ_ERROR: &str = "pluginDirectoryReadError";
    pub const CONFIG_READ_ERROR: &str = "configReadError";
    pub const THEME_APPLIED: &str = "themeApplied";
    pub const THEME_APPLY_FAILED: &str = "themeApplyFailed";
    pub const THEME_LOAD_FAILED: &str = "themeLoadFailed";
    pub const THEME_REMOVED: &str = "themeRemoved";
    pub const THEME_CONFIG_READ_ERROR: &str = "themeConfigReadError";
    pub const THEME_CONFIG_WRITE_ERROR: &str = "themeConfigWriteError";
    pub const MESSAGE_SEND: &str = "messageSend";
    pub const TOAST_REQUESTED: &str = "toastRequested";
}

/// Events emitted by the runtime itself
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    PluginLoadFailed {
        id: String,
        error: String,
        reason: String,
    },
    PluginLoaded {
        id: String,
        name: String,
        /// Plugin metadata as JSON
        plugin: Value,
    },
    PluginOnLoadFailed {
        id: String,
        name: String,
        error: String,
    },
    PluginEnabled {
        id: String,
        name: String,
    },
    PluginEnableFailed {
        id: String,
        name: String,
        error: String,
    },
    PluginDisabled {
        id: String,
        name: String,
    },
    PluginDisableFailed {
        id: String,
        name: String,
        error: String,
    },
    PluginConfigUpdated {
        name: String,
        enabled: bool,
    },
    PluginConfigReadError {
        file: String,
        error: String,
        context: String,
    },
    PluginConfigWriteError {
        file: String,
        error: String,
    },
    PluginDirectoryReadError {
        directory: String,
        error: String,
    },
    ConfigReadError {
        file: String,
        error: String,
    },
    ThemeApplied {
        name: String,
    },
    ThemeApplyFailed {
        name: String,
        error: String,
    },
    ThemeLoadFailed {
        name: String,
        error: String,
    },
    ThemeRemoved {
        name: String,
    },
    ThemeConfigReadError {
        file: String,
        error: String,
        context: String,
    },
    ThemeConfigWriteError {
        file: String,
        error: String,
    },
    MessageSend {
        content: String,
        channel_id: Option<String>,
    },
    ToastRequested {
        content: String,
        kind: String,
    },
}

impl RuntimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PluginLoadFailed { .. } => names::PLUGIN_LOAD_FAILED,
            Self::PluginLoaded { .. } => names::PLUGIN_LOADED,
            Self::PluginOnLoadFailed { .. } => names::PLUGIN_ON_LOAD_FAILED,
            Self::PluginEnabled { .. } => names::PLUGIN_ENABLED,
            Self::PluginEnableFailed { .. } => names::PLUGIN_ENABLE_FAILED,
            Self::PluginDisabled { .. } => names::PLUGIN_DISABLED,
            Self::PluginDisableFailed { .. } => names::PLUGIN_DISABLE_FAILED,
            Self::PluginConfigUpdated { .. } => names::PLUGIN_CONFIG_UPDATED,
            Self::PluginConfigReadError { .. } => names::PLUGIN_CONFIG_READ_ERROR,
            Self::PluginConfigWriteError { .. } => names::PLUGIN_CONFIG_WRITE_ERROR,
            Self::PluginDirectoryReadError { .. } => names::PLUGIN_DIRECTORY_READ_ERROR,
            Self::ConfigReadError { .. } => names::CONFIG_READ_ERROR,
            Self::ThemeApplied { .. } => names::THEME_APPLIED,
            Self::ThemeApplyFailed { .. } => names::THEME_APPLY_FAILED,
            Self::ThemeLoadFailed { .. } => names::THEME_LOAD_FAILED,
            Self::ThemeRemoved { .. } => names::THEME_REMOVED,
            Self::ThemeConfigReadError { .. } => names::THEME_CONFIG_READ_ERROR,
            Self::ThemeConfigWriteError { .. } => names::THEME_CONFIG_WRITE_ERROR,
            Self::MessageSend { .. } => names::MESSAGE_SEND,
            Self::ToastRequested { .. } => names::TOAST_REQUESTED,
        }
    }

    /// JSON payload delivered to subscribers
    pub fn payload(&self) -> Value {
        match self {
            Self::PluginLoadFailed { id, error, reason } => {
                json!({ "id": id, "error": error, "reason": reason })
            }
            Self::PluginLoaded { id, name, plugin } => {
                json!({ "id": id, "name": name, "plugin": plugin })
            }
            Self::PluginOnLoadFailed { id, name, error }
            | Self::PluginEnableFailed { id, name, error }
            | Self::PluginDisableFailed { id, name, error } => {
                json!({ "id": id, "name": name, "error": error })
            }
            Self::PluginEnabled { id, name } | Self::PluginDisabled { id, name } => {
                json!({ "id": id, "name": name })
            }
            Self::PluginConfigUpdated { name, enabled } => {
                json!({ "name": name, "enabled": enabled })
            }
            Self::PluginConfigReadError {
                file,
                error,
                context,
            }
            | Self::ThemeConfigReadError {
                file,
                error,
                context,
            } => json!({ "file": file, "error": error, "context": context }),
            Self::PluginConfigWriteError { file, error }
            | Self::ThemeConfigWriteError { file, error }
            | Self::ConfigReadError { file, error } => json!({ "file": file, "error": error }),
            Self::PluginDirectoryReadError { directory, error } => {
                json!({ "directory": directory, "error": error })
            }
            Self::ThemeApplied { name } | Self::ThemeRemoved { name } => json!({ "name": name }),
            Self::ThemeApplyFailed { name, error } | Self::ThemeLoadFailed { name, error } => {
                json!({ "name": name, "error": error })
            }
            Self::MessageSend {
                content,
                channel_id,
            } => json!({ "content": content, "channelId": channel_id }),
            Self::ToastRequested { content, kind } => json!({ "content": content, "type": kind }),
        }
    }
}
