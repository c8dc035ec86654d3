//! # ModKit
//!
//! A plugin and theme lifecycle runtime for client-side chat modifications:
//! - Lua plugins discovered from a directory, each in its own sandbox
//! - CSS themes with a single active theme
//! - A stable API facade over host internals captured at runtime
//! - A persistent settings document and per-plugin JSON storage
//! - An in-process event bus for lifecycle and host events
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use modkit::{MemoryStyleSink, Runtime, RuntimeConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let runtime = Runtime::new(
//!         RuntimeConfig::from_base_dir("./modkit"),
//!         Arc::new(MemoryStyleSink::new()),
//!     );
//!
//!     let summary = runtime.start().await;
//!     println!("{} plugin(s) enabled", summary.enabled);
//!
//!     runtime.plugins().set_plugin_enabled("hello.plugin.lua", true).await;
//!     runtime.themes().set_active_theme(Some("midnight.theme.css"));
//! }
//! ```
//!
//! ## Host integration
//!
//! The host application is never controlled directly. Implement
//! [`host::ModuleRegistry`] for its module system and pass it to
//! [`Runtime::attach_host`]; captured stores become available through
//! [`api::ModApi`] as they appear.

pub mod api;
pub mod config;
pub mod core;
pub mod events;
pub mod host;
pub mod plugins;
pub mod storage;
pub mod themes;

// Re-export commonly used types for convenience
pub use api::{ApiError, ModApi};
pub use config::RuntimeConfig;
pub use core::Runtime;
pub use events::{EventBus, RuntimeEvent};
pub use plugins::{PluginInfo, PluginLoader, PluginState};
pub use themes::{MemoryStyleSink, StyleSink, ThemeManager};
