// ModKit - Stable API Facade
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The versioned surface plugins program against
//!
//! Capability-backed methods share one contract: look the capability up in
//! the [`CapabilityTable`], fail with [`ApiError::ModuleNotFound`] when it is
//! absent, otherwise call into the host and normalise whatever comes back
//! (an immediate value, a deferred one, an error, a panic) into a single
//! awaited `Result`. Nothing escapes as a panic.
//!
//! Storage methods are synchronous and infallible from the caller's point
//! of view; see [`PluginDataStore`].

mod error;

pub use error::ApiError;

use futures::FutureExt;
use serde_json::{Value, json};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::core::logger::PluginLogger;
use crate::events::{EventBus, RuntimeEvent, SubscriptionId};
use crate::host::{Capability, CapabilityTable, HostError};
use crate::storage::PluginDataStore;
use crate::{log_debug, log_error};

/// Version of the facade contract
pub const API_VERSION: &str = "1.0.0";

pub type ApiResult = Result<Value, ApiError>;

pub struct ModApi {
    capabilities: Arc<CapabilityTable>,
    bus: Arc<EventBus>,
    data: PluginDataStore,
}

impl ModApi {
    pub fn new(capabilities: Arc<CapabilityTable>, bus: Arc<EventBus>, data: PluginDataStore) -> Self {
        Self {
            capabilities,
            bus,
            data,
        }
    }

    pub fn version(&self) -> &'static str {
        API_VERSION
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn capabilities(&self) -> &Arc<CapabilityTable> {
        &self.capabilities
    }

    pub fn data_store(&self) -> &PluginDataStore {
        &self.data
    }

    async fn invoke(&self, capability: Capability, method: &'static str, args: Vec<Value>) -> ApiResult {
        let Some(handle) = self.capabilities.get(capability) else {
            let err = ApiError::ModuleNotFound(capability);
            log_error!("{}", err);
            return Err(err);
        };

        if !handle.has_method(method) {
            return Err(ApiError::MethodUnavailable { capability, method });
        }

        // Host methods may fail before returning anything to wait on
        let call = panic::catch_unwind(AssertUnwindSafe(|| handle.call(method, args)))
            .map_err(HostError::from_panic)?;

        let result = match AssertUnwindSafe(call.resolve()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(HostError::from_panic(payload)),
        };

        if let Err(e) = &result {
            log_debug!("{}.{} failed: {}", capability, method, e);
        }
        result.map_err(ApiError::from)
    }

    // Messages

    /// Send a message; a bare string is sent as `{content}`
    pub async fn send_message(&self, channel_id: &str, data: Value) -> ApiResult {
        self.invoke(
            Capability::MessageActions,
            "sendMessage",
            vec![json!(channel_id), normalize_message(data)],
        )
        .await
    }

    pub async fn edit_message(&self, channel_id: &str, message_id: &str, data: Value) -> ApiResult {
        self.invoke(
            Capability::MessageActions,
            "editMessage",
            vec![json!(channel_id), json!(message_id), normalize_message(data)],
        )
        .await
    }

    // Reactions

    pub async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: Value) -> ApiResult {
        self.invoke(
            Capability::ReactionModule,
            "addReaction",
            vec![json!(channel_id), json!(message_id), emoji],
        )
        .await
    }

    pub async fn remove_reaction(&self, channel_id: &str, message_id: &str, emoji: Value) -> ApiResult {
        self.invoke(
            Capability::ReactionModule,
            "removeReaction",
            vec![json!(channel_id), json!(message_id), emoji],
        )
        .await
    }

    // Users

    pub async fn get_current_user(&self) -> ApiResult {
        self.invoke(Capability::UserStore, "getCurrentUser", vec![]).await
    }

    pub async fn get_user(&self, user_id: &str) -> ApiResult {
        self.invoke(Capability::UserStore, "getUser", vec![json!(user_id)])
            .await
    }

    // Channels

    pub async fn get_channel(&self, channel_id: &str) -> ApiResult {
        self.invoke(Capability::ChannelStore, "getChannel", vec![json!(channel_id)])
            .await
    }

    // Guilds

    pub async fn get_guild(&self, guild_id: &str) -> ApiResult {
        self.invoke(Capability::GuildStore, "getGuild", vec![json!(guild_id)])
            .await
    }

    pub async fn get_guilds(&self) -> ApiResult {
        self.invoke(Capability::GuildStore, "getGuilds", vec![]).await
    }

    // Presence

    pub async fn get_status(&self, user_id: &str) -> ApiResult {
        self.invoke(Capability::PresenceStore, "getStatus", vec![json!(user_id)])
            .await
    }

    pub async fn get_activities(&self, user_id: &str) -> ApiResult {
        self.invoke(Capability::PresenceStore, "getActivities", vec![json!(user_id)])
            .await
    }

    // Storage

    pub fn save_data(&self, plugin_id: &str, data: &Value) -> bool {
        self.data.save(plugin_id, data)
    }

    pub fn load_data(&self, plugin_id: &str, default: Value) -> Value {
        self.data.load(plugin_id, default)
    }

    pub fn delete_data(&self, plugin_id: &str) -> bool {
        self.data.delete(plugin_id)
    }

    // Events

    pub fn subscribe<F>(&self, event: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(event, callback)
    }

    pub fn unsubscribe(&self, event: &str, id: &str) -> bool {
        self.bus.unsubscribe(event, id)
    }

    // UI

    /// Ask the UI layer to show a toast. `kind` defaults to `info`
    pub fn show_toast(&self, content: &str, kind: Option<&str>) {
        self.bus.publish(RuntimeEvent::ToastRequested {
            content: content.to_string(),
            kind: kind.unwrap_or("info").to_string(),
        });
    }

    // Logging

    pub fn create_plugin_logger(&self, name: &str) -> PluginLogger {
        PluginLogger::new(name)
    }
}

fn normalize_message(data: Value) -> Value {
    match data {
        Value::String(content) => json!({ "content": content }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;
    use crate::host::{HostCall, HostResult, MethodTable};
    use std::sync::Mutex;
    use tempfile::TempDir;

    async fn explode() -> HostResult {
        panic!("deferred host bug")
    }

    fn api_with(capabilities: Vec<(Capability, MethodTable)>) -> (ModApi, TempDir) {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(CapabilityTable::new());
        for (capability, methods) in capabilities {
            table.insert(capability, methods.into_object());
        }
        let api = ModApi::new(table, Arc::new(EventBus::new()), PluginDataStore::new(dir.path()));
        (api, dir)
    }

    #[tokio::test]
    async fn test_missing_capability_is_module_not_found() {
        let (api, _dir) = api_with(vec![]);

        let err = api.get_guild("1").await.unwrap_err();
        assert_eq!(err, ApiError::ModuleNotFound(Capability::GuildStore));
        assert_eq!(err.to_string(), "GuildStore module not found");

        assert!(matches!(
            api.send_message("1", json!("hi")).await,
            Err(ApiError::ModuleNotFound(Capability::MessageActions))
        ));
    }

    #[tokio::test]
    async fn test_sync_and_deferred_results_look_the_same() {
        let users = MethodTable::new()
            .with_method("getCurrentUser", |_| HostCall::ready(json!({"id": "me"})))
            .with_method("getUser", |args| {
                let id = args[0].clone();
                HostCall::deferred(async move { Ok(json!({ "id": id })) })
            });
        let (api, _dir) = api_with(vec![(Capability::UserStore, users)]);

        assert_eq!(api.get_current_user().await, Ok(json!({"id": "me"})));
        assert_eq!(api.get_user("42").await, Ok(json!({"id": "42"})));
    }

    #[tokio::test]
    async fn test_host_failures_become_results() {
        let guilds = MethodTable::new()
            .with_method("getGuild", |_| HostCall::failed("Unknown Guild"))
            .with_method("getGuilds", |_| panic!("host bug"));
        let presence = MethodTable::new()
            .with_method("getStatus", |_| {
                HostCall::deferred(async { Err(HostError::raised("offline")) })
            })
            .with_method("getActivities", |_| HostCall::deferred(explode()));
        let (api, _dir) = api_with(vec![
            (Capability::GuildStore, guilds),
            (Capability::PresenceStore, presence),
        ]);

        assert_eq!(
            api.get_guild("1").await,
            Err(ApiError::Host(HostError::raised("Unknown Guild")))
        );
        assert_eq!(
            api.get_guilds().await,
            Err(ApiError::Host(HostError::Panicked("host bug".to_string())))
        );
        assert_eq!(
            api.get_status("1").await,
            Err(ApiError::Host(HostError::raised("offline")))
        );
        assert!(matches!(
            api.get_activities("1").await,
            Err(ApiError::Host(HostError::Panicked(_)))
        ));
    }

    #[tokio::test]
    async fn test_string_message_is_normalized() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let actions = MethodTable::new()
            .with_method("sendMessage", move |args| {
                sink.lock().unwrap().push(args);
                HostCall::ready(json!({"id": "m1"}))
            })
            .with_method("editMessage", |args| HostCall::ready(args[2].clone()));
        let (api, _dir) = api_with(vec![(Capability::MessageActions, actions)]);

        api.send_message("c1", json!("hello")).await.unwrap();
        api.send_message("c1", json!({"content": "embed", "tts": true}))
            .await
            .unwrap();
        let sent = sent.lock().unwrap();
        assert_eq!(sent[0], vec![json!("c1"), json!({"content": "hello"})]);
        assert_eq!(sent[1][1]["tts"], true);

        let edited = api.edit_message("c1", "m1", json!("fixed")).await.unwrap();
        assert_eq!(edited, json!({"content": "fixed"}));
    }

    #[tokio::test]
    async fn test_method_unavailable() {
        let reactions = MethodTable::new().with_method("addReaction", |_| HostCall::ready(Value::Null));
        let (api, _dir) = api_with(vec![(Capability::ReactionModule, reactions)]);

        assert_eq!(api.add_reaction("c", "m", json!("👍")).await, Ok(Value::Null));
        assert_eq!(
            api.remove_reaction("c", "m", json!("👍")).await,
            Err(ApiError::MethodUnavailable {
                capability: Capability::ReactionModule,
                method: "removeReaction"
            })
        );
    }

    #[test]
    fn test_storage_round_trip() {
        let (api, _dir) = api_with(vec![]);
        let value = json!({"greeting": "hi", "count": 2});

        assert!(api.save_data("hello", &value));
        assert_eq!(api.load_data("hello", json!({})), value);
        assert!(api.delete_data("hello"));
        assert_eq!(api.load_data("hello", json!({})), json!({}));
    }

    #[test]
    fn test_show_toast_emits_event() {
        let (api, _dir) = api_with(vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        api.subscribe(names::TOAST_REQUESTED, move |payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });

        api.show_toast("Saved", None);
        api.show_toast("Failed", Some("error"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], json!({"content": "Saved", "type": "info"}));
        assert_eq!(seen[1]["type"], "error");
        assert_eq!(api.version(), "1.0.0");
    }
}
