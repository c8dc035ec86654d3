use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

// File naming
pub const PLUGIN_SUFFIX: &str = ".plugin.lua";
pub const THEME_SUFFIXES: &[&str] = &[".theme.css", ".css"];

// Layout under the base directory
pub const PLUGIN_DIR_NAME: &str = "plugins";
pub const THEME_DIR_NAME: &str = "themes";
pub const CONFIG_DIR_NAME: &str = "config";
/// Plugin data lives under the plugin directory
pub const DATA_DIR_NAME: &str = "data";
pub const CONFIG_FILE_NAME: &str = "settings.json";

/// How often the capability extractor polls for the host module registry
pub const HOST_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Memory limit for each plugin's Lua state, in bytes
pub const PLUGIN_MEMORY_LIMIT: usize = 10_000_000;

/// Id of the single style element holding the active theme
pub const THEME_ELEMENT_ID: &str = "modkit-theme";

/// Filesystem locations used by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub plugin_dir: PathBuf,
    pub theme_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
}

impl RuntimeConfig {
    pub fn from_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let plugin_dir = base.join(PLUGIN_DIR_NAME);
        Self {
            data_dir: plugin_dir.join(DATA_DIR_NAME),
            plugin_dir,
            theme_dir: base.join(THEME_DIR_NAME),
            config_file: base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Plugin and theme manager for chat client mods")]
pub struct Cli {
    /// Base directory holding plugins/, themes/ and config/
    #[arg(short, long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Emit journald-formatted log lines
    #[arg(long)]
    pub journald: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load every plugin and print its state
    List,

    /// Enable a plugin by file name
    Enable { file: String },

    /// Disable a plugin by file name
    Disable { file: String },

    /// List available themes
    Themes,

    /// Activate a theme by file name, or clear it with --clear
    Theme {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        clear: bool,
    },

    /// Load everything once and report failures
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_base_dir() {
        let config = RuntimeConfig::from_base_dir("/opt/mod");
        assert_eq!(config.plugin_dir, PathBuf::from("/opt/mod/plugins"));
        assert_eq!(config.theme_dir, PathBuf::from("/opt/mod/themes"));
        assert_eq!(config.data_dir, PathBuf::from("/opt/mod/plugins/data"));
        assert_eq!(
            config.config_file,
            PathBuf::from("/opt/mod/config/settings.json")
        );
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["modkit", "--base-dir", "/tmp/m", "enable", "a.plugin.lua"]);
        assert_eq!(cli.base_dir, PathBuf::from("/tmp/m"));
        assert_eq!(
            cli.command,
            Command::Enable {
                file: "a.plugin.lua".to_string()
            }
        );

        let cli = Cli::parse_from(["modkit", "theme", "--clear"]);
        assert_eq!(
            cli.command,
            Command::Theme {
                name: None,
                clear: true
            }
        );
    }
}
