// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reload callbacks configured as pattern templates.

use lively::{url_for_source, CallbackResult, ChangeEvent, ReloadCallback, ReloadPattern};
use std::path::Path;

/// Expands fixed pattern templates for every change.
///
/// Placeholders: `{url}` is the changed file's URL (`/docs/a.md`), `{dir}`
/// its directory URL with a trailing slash (`/docs/`) and `{kind}` the
/// change kind.
#[derive(Debug, Clone)]
pub struct TemplateCallback {
    name: String,
    templates: Vec<String>,
}

impl TemplateCallback {
    /// Creates a callback named after the pattern it is registered for.
    pub fn new(name: impl Into<String>, templates: Vec<String>) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }
}

impl ReloadCallback for TemplateCallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, root: &Path, event: &ChangeEvent) -> CallbackResult {
        let Some(url) = url_for_source(root, &event.path) else {
            return Ok(vec![ReloadPattern::everything()]);
        };
        let dir = match url.rfind('/') {
            Some(idx) => &url[..=idx],
            None => "/",
        };

        Ok(self
            .templates
            .iter()
            .map(|t| {
                ReloadPattern::new(
                    t.replace("{url}", &url)
                        .replace("{dir}", dir)
                        .replace("{kind}", event.kind.as_str()),
                )
            })
            .collect())
    }
}
