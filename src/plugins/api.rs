//! Lua bindings for the API facade
//!
//! Before any hook runs, the loader sets `module.api` and `module.logger` on
//! the plugin's module table:
//!
//! ```lua
//! function M:onEnable()
//!     local user, err = self.api.users.getCurrentUser()
//!     if err then self.logger.warn(err) return end
//!     self.api.storage.saveData({ lastUser = user.id })
//! end
//! ```
//!
//! Host-backed calls return `result, nil` on success and `nil, message` on
//! failure; they must be called from a hook (they suspend). Storage calls
//! are bound to the plugin's own id.

use mlua::{FromLua, IntoLua, Lua, LuaSerdeExt, Table, Value as LuaValue};
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::api::{ApiResult, ModApi, API_VERSION};
use crate::core::logger::PluginLogger;
use crate::events::{EventBus, SubscriptionId};

/// A JSON value crossing the Lua boundary
///
/// JSON `null` maps to `nil`. Lua functions and other values without a JSON
/// form are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonValue(pub Value);

impl IntoLua for JsonValue {
    fn into_lua(self, lua: &Lua) -> mlua::Result<LuaValue> {
        let options = mlua::SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        lua.to_value_with(&self.0, options)
    }
}

impl FromLua for JsonValue {
    fn from_lua(value: LuaValue, lua: &Lua) -> mlua::Result<Self> {
        let options = mlua::DeserializeOptions::new().deny_unsupported_types(false);
        lua.from_value_with(value, options).map(JsonValue)
    }
}

/// A stored JSON value handed to Lua
///
/// Unlike [`JsonValue`], `null` becomes the `api.storage.null` sentinel so
/// that a plugin loading and saving its data keeps null fields and array
/// slots.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredJson(pub Value);

impl IntoLua for StoredJson {
    fn into_lua(self, lua: &Lua) -> mlua::Result<LuaValue> {
        let options = mlua::SerializeOptions::new()
            .serialize_none_to_null(true)
            .serialize_unit_to_null(true);
        lua.to_value_with(&self.0, options)
    }
}

/// Event subscriptions created by one plugin instance
#[derive(Debug, Clone, Default)]
pub struct SubscriptionLedger {
    entries: Arc<Mutex<Vec<(String, SubscriptionId)>>>,
}

impl SubscriptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &str, id: SubscriptionId) {
        self.lock().push((event.to_string(), id));
    }

    pub fn forget(&self, event: &str, id: &str) {
        self.lock().retain(|(e, i)| !(e == event && i == id));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unsubscribe everything recorded, returning how many were removed
    pub fn purge(&self, bus: &EventBus) -> usize {
        let entries = std::mem::take(&mut *self.lock());
        entries
            .iter()
            .filter(|(event, id)| bus.unsubscribe(event, id))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, SubscriptionId)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Everything the bindings of one plugin close over
#[derive(Clone)]
pub struct PluginContext {
    pub plugin_id: String,
    pub api: Arc<ModApi>,
    pub logger: PluginLogger,
    pub subscriptions: SubscriptionLedger,
}

/// `(result, nil)` or `(nil, message)`
fn into_pair(result: ApiResult) -> (Option<JsonValue>, Option<String>) {
    match result {
        Ok(value) => (Some(JsonValue(value)), None),
        Err(e) => (None, Some(e.to_string())),
    }
}

/// Set `module.api` and `module.logger`
pub fn install(lua: &Lua, module: &Table, ctx: &PluginContext) -> mlua::Result<()> {
    let logger = create_logger_table(lua, &ctx.logger)?;
    let api = create_api_table(lua, ctx, logger.clone())?;
    module.set("api", api)?;
    module.set("logger", logger)?;
    Ok(())
}

fn create_logger_table(lua: &Lua, logger: &PluginLogger) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let l = logger.clone();
    table.set("log", lua.create_function(move |_, msg: String| {
        l.log(&msg);
        Ok(())
    })?)?;

    let l = logger.clone();
    table.set("info", lua.create_function(move |_, msg: String| {
        l.info(&msg);
        Ok(())
    })?)?;

    let l = logger.clone();
    table.set("warn", lua.create_function(move |_, msg: String| {
        l.warn(&msg);
        Ok(())
    })?)?;

    let l = logger.clone();
    table.set("debug", lua.create_function(move |_, msg: String| {
        l.debug(&msg);
        Ok(())
    })?)?;

    let l = logger.clone();
    table.set(
        "error",
        lua.create_function(move |_, (msg, cause): (String, Option<String>)| {
            l.error(&msg, cause.as_deref());
            Ok(())
        })?,
    )?;

    Ok(table)
}

fn create_api_table(lua: &Lua, ctx: &PluginContext, logger: Table) -> mlua::Result<Table> {
    let api = lua.create_table()?;
    api.set("version", API_VERSION)?;
    api.set("logger", logger)?;
    api.set("messages", create_messages_table(lua, &ctx.api)?)?;
    api.set("reactions", create_reactions_table(lua, &ctx.api)?)?;
    api.set("users", create_users_table(lua, &ctx.api)?)?;
    api.set("channels", create_channels_table(lua, &ctx.api)?)?;
    api.set("guilds", create_guilds_table(lua, &ctx.api)?)?;
    api.set("presence", create_presence_table(lua, &ctx.api)?)?;
    api.set("storage", create_storage_table(lua, ctx)?)?;
    api.set("events", create_events_table(lua, ctx)?)?;
    api.set("ui", create_ui_table(lua, &ctx.api)?)?;
    Ok(api)
}

fn create_messages_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let a = api.clone();
    let send = lua.create_async_function(move |_, (channel, data): (String, JsonValue)| {
        let a = a.clone();
        async move { Ok(into_pair(a.send_message(&channel, data.0).await)) }
    })?;
    table.set("sendMessage", send)?;

    let a = api.clone();
    let edit = lua.create_async_function(
        move |_, (channel, message, data): (String, String, JsonValue)| {
            let a = a.clone();
            async move { Ok(into_pair(a.edit_message(&channel, &message, data.0).await)) }
        },
    )?;
    table.set("editMessage", edit)?;

    Ok(table)
}

fn create_reactions_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let a = api.clone();
    let add = lua.create_async_function(
        move |_, (channel, message, emoji): (String, String, JsonValue)| {
            let a = a.clone();
            async move { Ok(into_pair(a.add_reaction(&channel, &message, emoji.0).await)) }
        },
    )?;
    table.set("addReaction", add)?;

    let a = api.clone();
    let remove = lua.create_async_function(
        move |_, (channel, message, emoji): (String, String, JsonValue)| {
            let a = a.clone();
            async move { Ok(into_pair(a.remove_reaction(&channel, &message, emoji.0).await)) }
        },
    )?;
    table.set("removeReaction", remove)?;

    Ok(table)
}

fn create_users_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let a = api.clone();
    let current = lua.create_async_function(move |_, ()| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_current_user().await)) }
    })?;
    table.set("getCurrentUser", current)?;

    let a = api.clone();
    let user = lua.create_async_function(move |_, id: String| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_user(&id).await)) }
    })?;
    table.set("getUser", user)?;

    Ok(table)
}

fn create_channels_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let a = api.clone();
    let channel = lua.create_async_function(move |_, id: String| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_channel(&id).await)) }
    })?;
    table.set("getChannel", channel)?;

    Ok(table)
}

fn create_guilds_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let a = api.clone();
    let guild = lua.create_async_function(move |_, id: String| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_guild(&id).await)) }
    })?;
    table.set("getGuild", guild)?;

    let a = api.clone();
    let guilds = lua.create_async_function(move |_, ()| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_guilds().await)) }
    })?;
    table.set("getGuilds", guilds)?;

    Ok(table)
}

fn create_presence_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let a = api.clone();
    let status = lua.create_async_function(move |_, id: String| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_status(&id).await)) }
    })?;
    table.set("getStatus", status)?;

    let a = api.clone();
    let activities = lua.create_async_function(move |_, id: String| {
        let a = a.clone();
        async move { Ok(into_pair(a.get_activities(&id).await)) }
    })?;
    table.set("getActivities", activities)?;

    Ok(table)
}

fn create_storage_table(lua: &Lua, ctx: &PluginContext) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let (a, id) = (ctx.api.clone(), ctx.plugin_id.clone());
    table.set(
        "saveData",
        lua.create_function(move |_, data: JsonValue| Ok(a.save_data(&id, &data.0)))?,
    )?;

    let (a, id) = (ctx.api.clone(), ctx.plugin_id.clone());
    table.set(
        "loadData",
        lua.create_function(move |_, default: Option<JsonValue>| {
            let default = default.map_or_else(|| Value::Object(Default::default()), |d| d.0);
            Ok(StoredJson(a.load_data(&id, default)))
        })?,
    )?;
    table.set("null", lua.null())?;

    let (a, id) = (ctx.api.clone(), ctx.plugin_id.clone());
    table.set(
        "deleteData",
        lua.create_function(move |_, ()| Ok(a.delete_data(&id)))?,
    )?;

    Ok(table)
}

fn create_events_table(lua: &Lua, ctx: &PluginContext) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let (a, ledger, logger) = (ctx.api.clone(), ctx.subscriptions.clone(), ctx.logger.clone());
    let subscribe = lua.create_function(move |_, (event, callback): (String, mlua::Function)| {
        let scope = logger.clone();
        let id = a.subscribe(&event, move |payload| {
            callback
                .call::<()>(JsonValue(payload.clone()))
                .map_err(|e| {
                    scope.error("Error in event handler", Some(&e.to_string()));
                    anyhow::anyhow!("{}", e)
                })
        });
        ledger.record(&event, id.clone());
        Ok(id)
    })?;
    table.set("subscribe", subscribe)?;

    let (a, ledger) = (ctx.api.clone(), ctx.subscriptions.clone());
    let unsubscribe = lua.create_function(move |_, (event, id): (String, String)| {
        ledger.forget(&event, &id);
        Ok(a.unsubscribe(&event, &id))
    })?;
    table.set("unsubscribe", unsubscribe)?;

    Ok(table)
}

fn create_ui_table(lua: &Lua, api: &Arc<ModApi>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    // Accepts either a bare string or `{ content = ..., type = ... }`
    let a = api.clone();
    let toast = lua.create_function(move |_, (options, kind): (JsonValue, Option<String>)| {
        match options.0 {
            Value::String(content) => a.show_toast(&content, kind.as_deref()),
            Value::Object(map) => {
                let content = map.get("content").and_then(Value::as_str).unwrap_or_default();
                let kind = map.get("type").and_then(Value::as_str).or(kind.as_deref());
                a.show_toast(content, kind);
            }
            _ => return Err(mlua::Error::runtime("showToast expects a string or a table")),
        }
        Ok(())
    })?;
    table.set("showToast", toast)?;

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;
    use crate::host::{Capability, CapabilityTable, HostCall, MethodTable};
    use crate::plugins::sandbox::{PluginInstance, create_secure_lua_state};
    use crate::plugins::Hook;
    use crate::storage::PluginDataStore;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        ctx: PluginContext,
        bus: Arc<EventBus>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(CapabilityTable::new());
        table.insert(
            Capability::UserStore,
            MethodTable::new()
                .with_method("getCurrentUser", |_| {
                    HostCall::deferred(async { Ok(json!({"id": "7", "username": "me"})) })
                })
                .with_method("getUser", |_| HostCall::failed("Unknown User"))
                .into_object(),
        );
        let bus = Arc::new(EventBus::new());
        let api = Arc::new(ModApi::new(table, bus.clone(), PluginDataStore::new(dir.path())));
        let ctx = PluginContext {
            plugin_id: "sampler".to_string(),
            api,
            logger: PluginLogger::new("Sampler"),
            subscriptions: SubscriptionLedger::new(),
        };
        Fixture { ctx, bus, _dir: dir }
    }

    fn load(ctx: &PluginContext, source: &str) -> PluginInstance {
        let lua = create_secure_lua_state(&ctx.logger).unwrap();
        let instance = PluginInstance::evaluate(lua, source, "sampler.plugin.lua").unwrap();
        install(instance.lua(), instance.module(), ctx).unwrap();
        instance
    }

    #[tokio::test]
    async fn test_async_calls_return_result_and_error() {
        let f = fixture();
        let instance = load(
            &f.ctx,
            r#"
            local M = {}
            function M:onEnable()
                local me, err = self.api.users.getCurrentUser()
                self.name, self.err1 = me.username, err
                local user, err2 = self.api.users.getUser("1")
                self.user, self.err2 = user, err2
                local guild, err3 = self.api.guilds.getGuild("1")
                self.err3 = err3
            end
            return M
            "#,
        );

        instance.call_hook(Hook::OnEnable).await.unwrap();
        let module = instance.module();
        assert_eq!(module.get::<String>("name").unwrap(), "me");
        assert!(module.get::<Option<String>>("err1").unwrap().is_none());
        assert!(module.get::<LuaValue>("user").unwrap().is_nil());
        assert_eq!(module.get::<String>("err2").unwrap(), "Unknown User");
        assert_eq!(module.get::<String>("err3").unwrap(), "GuildStore module not found");
    }

    #[tokio::test]
    async fn test_storage_is_scoped_to_plugin() {
        let f = fixture();
        let instance = load(
            &f.ctx,
            r#"
            return {
                onLoad = function(self)
                    local data = self.api.storage.loadData({ count = 0 })
                    data.count = data.count + 1
                    self.api.storage.saveData(data)
                end,
            }
            "#,
        );

        instance.call_hook(Hook::OnLoad).await.unwrap();
        instance.call_hook(Hook::OnLoad).await.unwrap();
        assert_eq!(f.ctx.api.load_data("sampler", json!(null)), json!({"count": 2}));
    }

    #[tokio::test]
    async fn test_storage_round_trip_keeps_nulls() {
        let f = fixture();
        f.ctx
            .api
            .save_data("sampler", &json!({"a": null, "list": [1, null, 3]}));
        let instance = load(
            &f.ctx,
            r#"
            return {
                onLoad = function(self)
                    local data = self.api.storage.loadData()
                    self.a_is_null = data.a == self.api.storage.null
                    data.seen = true
                    self.api.storage.saveData(data)
                end,
            }
            "#,
        );

        instance.call_hook(Hook::OnLoad).await.unwrap();
        assert!(instance.module().get::<bool>("a_is_null").unwrap());
        assert_eq!(
            f.ctx.api.load_data("sampler", json!(null)),
            json!({"a": null, "list": [1, null, 3], "seen": true})
        );
    }

    #[tokio::test]
    async fn test_subscriptions_are_recorded_and_purged() {
        let f = fixture();
        let instance = load(
            &f.ctx,
            r#"
            local M = { seen = 0 }
            function M:onEnable()
                self.token = self.api.events.subscribe("messageSend", function(payload)
                    M.seen = M.seen + 1
                    M.last = payload.content
                end)
                self.api.events.subscribe("themeApplied", function() end)
            end
            return M
            "#,
        );

        instance.call_hook(Hook::OnEnable).await.unwrap();
        assert_eq!(f.ctx.subscriptions.len(), 2);

        f.bus.emit(names::MESSAGE_SEND, json!({"content": "hi", "channelId": "1"}));
        assert_eq!(instance.module().get::<i64>("seen").unwrap(), 1);
        assert_eq!(instance.module().get::<String>("last").unwrap(), "hi");

        assert_eq!(f.ctx.subscriptions.purge(&f.bus), 2);
        f.bus.emit(names::MESSAGE_SEND, json!({"content": "again"}));
        assert_eq!(instance.module().get::<i64>("seen").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_toast_and_logger_bindings() {
        let f = fixture();
        let toasts = Arc::new(Mutex::new(Vec::new()));
        let sink = toasts.clone();
        f.bus.subscribe(names::TOAST_REQUESTED, move |payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });

        let instance = load(
            &f.ctx,
            r#"
            return {
                onEnable = function(self)
                    self.logger.log("enabled")
                    self.logger.error("oops", "cause")
                    self.api.ui.showToast("plain")
                    self.api.ui.showToast({ content = "styled", type = "success" })
                    assert(self.api.version == "1.0.0")
                end,
            }
            "#,
        );

        instance.call_hook(Hook::OnEnable).await.unwrap();
        let toasts = toasts.lock().unwrap();
        assert_eq!(toasts[0], json!({"content": "plain", "type": "info"}));
        assert_eq!(toasts[1], json!({"content": "styled", "type": "success"}));
    }

    #[test]
    fn test_json_value_null_is_nil() {
        let lua = Lua::new();
        let value = JsonValue(json!({"a": null, "b": [1, 2]})).into_lua(&lua).unwrap();
        let table = value.as_table().unwrap();
        assert!(table.get::<LuaValue>("a").unwrap().is_nil());
        assert_eq!(table.get::<Table>("b").unwrap().raw_len(), 2);

        let back = JsonValue::from_lua(value, &lua).unwrap();
        assert_eq!(back.0, json!({"b": [1, 2]}));
    }
}
