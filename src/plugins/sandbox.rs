//! Security sandbox for plugin execution
//!
//! Every plugin gets its own Lua state. Libraries that reach the file system
//! or the process are removed, `print` goes to the plugin's logger, and the
//! state runs under a memory limit.

use futures::FutureExt;
use mlua::{Lua, Table, Value as LuaValue, Variadic};
use std::panic::AssertUnwindSafe;

use super::error::{Hook, PluginError};
use super::metadata::HeaderFields;
use crate::config::PLUGIN_MEMORY_LIMIT;
use crate::core::logger::PluginLogger;
use crate::host::module::panic_message;

/// Create a secure Lua state for one plugin
pub fn create_secure_lua_state(logger: &PluginLogger) -> mlua::Result<Lua> {
    let lua = Lua::new();
    let globals = lua.globals();

    for name in ["os", "io", "load", "loadfile", "dofile", "debug", "require"] {
        globals.set(name, LuaValue::Nil)?;
    }

    // Restrict package module to prevent loading external libraries
    if let Ok(package) = globals.get::<Table>("package") {
        package.set("loadlib", LuaValue::Nil)?;
        package.set("cpath", LuaValue::Nil)?;
        package.set("path", "")?;
    }

    lua.set_memory_limit(PLUGIN_MEMORY_LIMIT)?;
    redirect_print(&lua, logger)?;

    Ok(lua)
}

/// Point the global `print` at `logger`
pub fn redirect_print(lua: &Lua, logger: &PluginLogger) -> mlua::Result<()> {
    let scoped = logger.clone();
    let print = lua.create_function(move |lua, args: Variadic<LuaValue>| {
        let tostring: mlua::Function = lua.globals().get("tostring")?;
        let parts = args
            .into_iter()
            .map(|arg| tostring.call::<String>(arg))
            .collect::<mlua::Result<Vec<_>>>()?;
        scoped.log(&parts.join("\t"));
        Ok(())
    })?;
    lua.globals().set("print", print)
}

/// First line of a Lua error, without the traceback
pub fn summarize_lua_error(error: &mlua::Error) -> String {
    let text = error.to_string();
    text.lines().next().unwrap_or_default().to_string()
}

/// An evaluated plugin: its Lua state and the module table it returned
pub struct PluginInstance {
    lua: Lua,
    module: Table,
}

impl PluginInstance {
    /// Run the plugin chunk, which must return a table
    pub fn evaluate(lua: Lua, source: &str, chunk_name: &str) -> Result<Self, PluginError> {
        let value: LuaValue = lua
            .load(source)
            .set_name(format!("={}", chunk_name))
            .eval()?;

        match value {
            LuaValue::Table(module) => Ok(Self { lua, module }),
            other => Err(PluginError::MissingExport(other.type_name().to_string())),
        }
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn module(&self) -> &Table {
        &self.module
    }

    /// Fields of the module's `meta` table, if it has one
    pub fn declared_metadata(&self) -> HeaderFields {
        let Ok(LuaValue::Table(meta)) = self.module.get::<LuaValue>("meta") else {
            return HeaderFields::default();
        };
        let field = |key: &str| {
            meta.get::<Option<String>>(key)
                .ok()
                .flatten()
                .filter(|value| !value.is_empty())
        };
        HeaderFields {
            name: field("name"),
            version: field("version"),
            description: field("description"),
            author: field("author"),
        }
    }

    pub fn has_hook(&self, hook: Hook) -> bool {
        matches!(
            self.module.get::<LuaValue>(hook.as_str()),
            Ok(LuaValue::Function(_))
        )
    }

    /// Invoke `hook` as a method on the module table
    ///
    /// Returns `Ok(false)` if the module does not export the hook. Lua
    /// errors and Rust panics raised inside the hook are both returned as
    /// errors.
    pub async fn call_hook(&self, hook: Hook) -> Result<bool, PluginError> {
        let func = match self.module.get::<LuaValue>(hook.as_str()) {
            Ok(LuaValue::Function(func)) => func,
            Ok(_) => return Ok(false),
            Err(e) => {
                return Err(PluginError::Hook {
                    hook,
                    message: summarize_lua_error(&e),
                });
            }
        };

        let call = func.call_async::<()>(self.module.clone());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(PluginError::Hook {
                hook,
                message: summarize_lua_error(&e),
            }),
            Err(payload) => Err(PluginError::HookPanicked {
                hook,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}
