//! Lua plugin system
//!
//! A plugin is a single `*.plugin.lua` file in the plugin directory whose
//! chunk returns a module table:
//!
//! ```lua
//! -- @name Hello
//! -- @version 1.0.0
//! local M = { meta = { name = "Hello", author = "someone" } }
//!
//! function M:onLoad() self.logger.log("loaded") end
//! function M:onEnable() self.api.ui.showToast("Hello!") end
//! function M:onDisable() end
//!
//! return M
//! ```
//!
//! # Security
//!
//! Plugins run in a secure sandbox with:
//! - No file I/O access
//! - No shell execution capabilities
//! - A memory limit per Lua state
//! - Storage access limited to the plugin's own data file

pub mod api;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod registry;
pub mod sandbox;

pub use error::{Hook, PluginError};
pub use loader::{LoadSummary, PluginLoader, ToggleOutcome};
pub use metadata::Metadata;
pub use registry::{PluginInfo, PluginRecord, PluginRegistry, PluginState};
