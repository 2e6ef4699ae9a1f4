// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Custom reload callbacks configured in `lively.toml`.

/// Lua-scripted callbacks.
pub mod lua;
/// Pattern template callbacks.
pub mod template;

pub use lua::LuaCallback;
pub use template::TemplateCallback;

use lively::{CallbackMatcher, CallbackRegistry, ReloadCallback};
use std::sync::Arc;

use crate::config::CallbackConfig;

/// Builds the callback registry: built-in defaults, then each configured
/// callback in order. A configured matcher equal to a built-in one replaces it.
pub fn build_registry(callbacks: &[CallbackConfig]) -> anyhow::Result<CallbackRegistry> {
    let mut registry = CallbackRegistry::with_defaults();

    for entry in callbacks {
        let matcher = CallbackMatcher::parse(&entry.pattern)?;
        let callback: Arc<dyn ReloadCallback> = match (&entry.script, &entry.reload) {
            (Some(script), None) => Arc::new(LuaCallback::from_file(script)?),
            (None, Some(templates)) => {
                Arc::new(TemplateCallback::new(&entry.pattern, templates.clone()))
            }
            _ => anyhow::bail!(
                "callback for '{}' must set exactly one of 'script' or 'reload'",
                entry.pattern
            ),
        };
        tracing::debug!(pattern = %entry.pattern, callback = callback.name(), "Registered callback");
        registry.register(matcher, callback);
    }

    Ok(registry)
}
