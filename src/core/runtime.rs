// ModKit - Runtime
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wires the event bus, capability table, API facade, plugin loader and
//! theme manager into one owned runtime.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::logger::{log_init_failed, log_init_ok_with_details, log_init_start, log_init_warn};
use crate::api::ModApi;
use crate::config::RuntimeConfig;
use crate::events::EventBus;
use crate::host::{CapabilityExtractor, CapabilityTable, MessageSendShim, ModuleRegistry};
use crate::plugins::{LoadSummary, PluginLoader};
use crate::storage::{ConfigLoad, ConfigStore, PluginDataStore};
use crate::themes::{StyleSink, ThemeManager};
use crate::{log_info, log_notice};

pub struct Runtime {
    config: RuntimeConfig,
    bus: Arc<EventBus>,
    capabilities: Arc<CapabilityTable>,
    api: Arc<ModApi>,
    extractor: Arc<CapabilityExtractor>,
    plugins: PluginLoader,
    themes: ThemeManager,
    shim: MessageSendShim,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, sink: Arc<dyn StyleSink>) -> Self {
        let bus = Arc::new(EventBus::new());
        let capabilities = Arc::new(CapabilityTable::new());
        let api = Arc::new(ModApi::new(
            capabilities.clone(),
            bus.clone(),
            PluginDataStore::new(&config.data_dir),
        ));

        Self {
            extractor: Arc::new(CapabilityExtractor::new(capabilities.clone())),
            plugins: PluginLoader::new(
                &config.plugin_dir,
                ConfigStore::new(&config.config_file),
                api.clone(),
            ),
            themes: ThemeManager::new(
                &config.theme_dir,
                ConfigStore::new(&config.config_file),
                sink,
                bus.clone(),
            ),
            shim: MessageSendShim::new(bus.clone()),
            config,
            bus,
            capabilities,
            api,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn capabilities(&self) -> &Arc<CapabilityTable> {
        &self.capabilities
    }

    pub fn api(&self) -> &Arc<ModApi> {
        &self.api
    }

    pub fn extractor(&self) -> &Arc<CapabilityExtractor> {
        &self.extractor
    }

    pub fn plugins(&self) -> &PluginLoader {
        &self.plugins
    }

    pub fn themes(&self) -> &ThemeManager {
        &self.themes
    }

    pub fn shim(&self) -> &MessageSendShim {
        &self.shim
    }

    /// Start watching the host module registry in the background
    pub fn attach_host(&self, registry: Arc<dyn ModuleRegistry>) -> JoinHandle<()> {
        log_init_start("capability extractor");
        self.extractor.spawn(registry)
    }

    /// Make sure the settings file exists, then load plugins and the
    /// configured theme
    pub async fn start(&self) -> LoadSummary {
        match ConfigStore::new(&self.config.config_file).load() {
            ConfigLoad::Created(_) => {
                log_info!("Created settings at {}", self.config.config_file.display())
            }
            ConfigLoad::Fallback { error, .. } => {
                log_init_warn("settings", &format!("using defaults: {}", error))
            }
            ConfigLoad::Loaded(_) => {}
        }

        log_init_start("plugins");
        let summary = self.plugins.reload_all().await;
        log_init_ok_with_details(
            "plugins",
            &format!(
                "{} loaded, {} failed, {} enabled",
                summary.loaded, summary.failed, summary.enabled
            ),
        );

        if let Err(e) = self.themes.discover() {
            log_init_failed("themes", &e.to_string());
        }
        if let Some(theme) = self.themes.apply_configured() {
            log_init_ok_with_details("themes", &format!("active theme {}", theme));
        }

        summary
    }

    /// Disable every plugin, remove the active theme and drop all
    /// subscriptions. The settings document is left untouched.
    pub async fn teardown(&self) {
        self.plugins.shutdown().await;
        self.themes.remove_active();
        self.bus.clear();
        log_notice!("Runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::THEME_ELEMENT_ID;
    use crate::events::names;
    use crate::host::{
        Capability, HostCall, MemoryModuleRegistry, MethodTable, ModuleBody, OutgoingRequest,
    };
    use crate::themes::MemoryStyleSink;
    use serde_json::{Value, json};
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const GREETER: &str = r#"
        -- @name Greeter
        local M = {}

        function M:onEnable()
            local me, err = self.api.users.getCurrentUser()
            if me then
                self.api.storage.saveData({ greeted = me.username })
            else
                self.api.storage.saveData({ error = err })
            end
        end

        return M
    "#;

    fn runtime(dir: &TempDir) -> (Runtime, Arc<MemoryStyleSink>) {
        let sink = Arc::new(MemoryStyleSink::new());
        let runtime = Runtime::new(RuntimeConfig::from_base_dir(dir.path()), sink.clone());
        (runtime, sink)
    }

    fn seed(dir: &TempDir) {
        let config = RuntimeConfig::from_base_dir(dir.path());
        fs::create_dir_all(&config.plugin_dir).unwrap();
        fs::create_dir_all(&config.theme_dir).unwrap();
        fs::write(config.plugin_dir.join("greeter.plugin.lua"), GREETER).unwrap();
        fs::write(config.theme_dir.join("dark.css"), "body { background: #000; }").unwrap();
        fs::create_dir_all(config.config_file.parent().unwrap()).unwrap();
        fs::write(
            &config.config_file,
            r#"{"enabledPlugins": ["greeter.plugin.lua"], "activeTheme": "dark.css"}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_start_without_host_reports_missing_module() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let (runtime, sink) = runtime(&dir);

        let summary = runtime.start().await;
        assert_eq!(summary.enabled, 1);
        assert_eq!(sink.count(THEME_ELEMENT_ID), 1);
        assert_eq!(
            runtime.api().load_data("greeter", json!(null)),
            json!({"error": "UserStore module not found"})
        );
    }

    #[tokio::test]
    async fn test_restart_keeps_single_theme_element() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let (runtime, sink) = runtime(&dir);

        runtime.start().await;
        runtime.start().await;
        assert_eq!(sink.count(THEME_ELEMENT_ID), 1);

        runtime.themes().set_active_theme(None);
        assert_eq!(sink.count(THEME_ELEMENT_ID), 0);
    }

    #[tokio::test]
    async fn test_start_after_host_attached() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let (runtime, _) = runtime(&dir);

        let registry = Arc::new(MemoryModuleRegistry::available());
        registry.push(vec![ModuleBody::from_fn("users", || {
            Ok(Some(
                MethodTable::new()
                    .with_method("getCurrentUser", |_| {
                        HostCall::ready(json!({"id": "1", "username": "me"}))
                    })
                    .with_method("getUser", |_| HostCall::ready(Value::Null))
                    .into_object(),
            ))
        })]);

        let handle = runtime.attach_host(registry.clone());
        tokio::time::timeout(Duration::from_secs(5), runtime.extractor().ready())
            .await
            .unwrap();
        handle.await.unwrap();
        assert!(runtime.capabilities().contains(Capability::UserStore));

        runtime.start().await;
        assert_eq!(
            runtime.api().load_data("greeter", json!(null)),
            json!({"greeted": "me"})
        );
    }

    #[tokio::test]
    async fn test_first_run_creates_layout() {
        let dir = TempDir::new().unwrap();
        let (runtime, sink) = runtime(&dir);

        let summary = runtime.start().await;
        assert_eq!(summary, LoadSummary::default());
        assert!(runtime.config().plugin_dir.is_dir());
        assert!(runtime.config().theme_dir.is_dir());
        assert!(runtime.config().config_file.is_file());
        assert_eq!(sink.count(THEME_ELEMENT_ID), 0);
    }

    #[tokio::test]
    async fn test_shim_publishes_to_plugins_and_teardown() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let (runtime, sink) = runtime(&dir);
        runtime.start().await;

        let sent = Arc::new(Mutex::new(Vec::new()));
        let seen = sent.clone();
        runtime.bus().subscribe(names::MESSAGE_SEND, move |payload| {
            seen.lock().unwrap().push(payload.clone());
            Ok(())
        });

        assert!(runtime.shim().observe(&OutgoingRequest::post(
            "https://chat.example/api/v9/channels/42/messages",
            r#"{"content":"hello"}"#,
        )));
        assert_eq!(
            sent.lock().unwrap()[0],
            json!({"content": "hello", "channelId": "42"})
        );

        runtime.teardown().await;
        assert!(runtime.plugins().plugins().await.is_empty());
        assert_eq!(sink.count(THEME_ELEMENT_ID), 0);
        assert_eq!(runtime.bus().subscriber_count(names::MESSAGE_SEND), 0);
    }
}
