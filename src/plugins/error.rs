use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Lifecycle hooks a plugin module may export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    OnLoad,
    OnEnable,
    OnDisable,
}

impl Hook {
    pub fn as_str(self) -> &'static str {
        match self {
            Hook::OnLoad => "onLoad",
            Hook::OnEnable => "onEnable",
            Hook::OnDisable => "onDisable",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised by plugin code or while preparing it
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to evaluate plugin: {0}")]
    Lua(#[from] mlua::Error),

    #[error("plugin must return a module table, got {0}")]
    MissingExport(String),

    #[error("error in {hook}: {message}")]
    Hook { hook: Hook, message: String },

    #[error("{hook} panicked: {message}")]
    HookPanicked { hook: Hook, message: String },
}

impl PluginError {
    /// Human-readable reason attached to `pluginLoadFailed`
    pub fn reason(&self) -> &'static str {
        match self {
            PluginError::Io { .. } => "Plugin file could not be read.",
            PluginError::Lua(_) => "Plugin file could not be evaluated.",
            PluginError::MissingExport(_) => "Plugin did not return a module table.",
            PluginError::Hook { .. } | PluginError::HookPanicked { .. } => {
                "Plugin lifecycle hook failed."
            }
        }
    }
}
