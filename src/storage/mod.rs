//! Local persistence: the settings document and plugin data files

pub mod config;
pub mod plugin_data;

pub use config::{ConfigDocument, ConfigError, ConfigLoad, ConfigStore};
pub use plugin_data::PluginDataStore;
