// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reload callbacks written in Lua.
//!
//! A script defines a global `handle(root, path, kind)` function, where
//! `kind` is `"created"`, `"modified"` or `"deleted"`. It returns a list of
//! patterns, a single pattern string, or `nil` for none.
//!
//! # Example
//!
//! ```lua
//! function handle(root, path, kind)
//!     if kind == "deleted" then
//!         return "**"
//!     end
//!     return { "/", "/blog/**" }
//! end
//! ```

use lively::{CallbackError, CallbackResult, ChangeEvent, ReloadCallback, ReloadPattern};
use mlua::{Function, Lua, Result as LuaResult, Value};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// A [`ReloadCallback`] backed by a Lua `handle` function.
pub struct LuaCallback {
    name: String,
    lua: Mutex<Lua>,
}

impl LuaCallback {
    /// Loads a callback script from disk.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read '{}': {}", path.display(), e))?;
        Self::from_source(&path.display().to_string(), &source)
    }

    /// Loads a callback from Lua source; `name` labels errors and logs.
    pub fn from_source(name: &str, source: &str) -> anyhow::Result<Self> {
        let lua = Lua::new();
        lua.load(source)
            .set_name(name)
            .exec()
            .map_err(|e| anyhow::anyhow!("Failed to load '{}': {}", name, e))?;

        if lua.globals().get::<Function>("handle").is_err() {
            anyhow::bail!("'{}' does not define a handle(root, path, kind) function", name);
        }

        Ok(Self {
            name: name.to_string(),
            lua: Mutex::new(lua),
        })
    }

    fn call(&self, root: &Path, event: &ChangeEvent) -> LuaResult<Vec<String>> {
        let lua = self.lua.lock().unwrap_or_else(PoisonError::into_inner);
        let handle: Function = lua.globals().get("handle")?;
        let result: Value = handle.call((
            root.to_string_lossy().into_owned(),
            event.path.to_string_lossy().into_owned(),
            event.kind.as_str(),
        ))?;
        patterns_from(result)
    }
}

impl ReloadCallback for LuaCallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, root: &Path, event: &ChangeEvent) -> CallbackResult {
        self.call(root, event)
            .map(|patterns| patterns.into_iter().map(ReloadPattern::new).collect())
            .map_err(|e| CallbackError::new(&self.name, e.to_string()))
    }
}

fn patterns_from(value: Value) -> LuaResult<Vec<String>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.to_str()?.to_string()]),
        Value::Table(t) => t.sequence_values::<String>().collect(),
        other => Err(mlua::Error::external(format!(
            "handle must return a string, a list of strings or nil, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(callback: &LuaCallback, event: &ChangeEvent) -> Vec<String> {
        callback
            .handle(Path::new("/site"), event)
            .unwrap()
            .into_iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_list_string_and_nil_results() {
        let callback = LuaCallback::from_source(
            "test.lua",
            r#"
            function handle(root, path, kind)
                if kind == "deleted" then return "**" end
                if path:match("%.draft$") then return nil end
                return { "/", root .. "|" .. path }
            end
            "#,
        )
        .unwrap();

        assert_eq!(
            patterns(&callback, &ChangeEvent::modified("/site/a.md")),
            vec!["/", "/site|/site/a.md"]
        );
        assert_eq!(patterns(&callback, &ChangeEvent::deleted("/site/a.md")), vec!["**"]);
        assert!(patterns(&callback, &ChangeEvent::modified("/site/a.draft")).is_empty());
    }

    #[test]
    fn test_runtime_error_becomes_callback_error() {
        let callback = LuaCallback::from_source(
            "broken.lua",
            "function handle(root, path, kind) error('nope') end",
        )
        .unwrap();

        let err = callback
            .handle(Path::new("/site"), &ChangeEvent::modified("/site/a.md"))
            .unwrap_err();
        assert_eq!(err.callback, "broken.lua");
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_bad_return_type() {
        let callback =
            LuaCallback::from_source("num.lua", "function handle() return 42 end").unwrap();
        assert!(callback
            .handle(Path::new("/site"), &ChangeEvent::modified("/site/a.md"))
            .is_err());
    }

    #[test]
    fn test_missing_handle_is_rejected() {
        assert!(LuaCallback::from_source("empty.lua", "local x = 1").is_err());
        assert!(LuaCallback::from_source("syntax.lua", "function handle(").is_err());
    }
}
