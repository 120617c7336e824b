use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::default_true;

/// A plugin entry from the `plugins` list.
///
/// The core never looks inside `options`; it hands them to whichever factory
/// was registered under `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginOptions {
    /// Name the plugin factory was registered under
    pub name: String,

    /// Plugin-specific options forwarded to the factory untouched
    #[serde(default)]
    pub options: Value,

    /// Move the plugin before or after the unmarked ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce: Option<PluginEnforce>,

    /// Whether the plugin should be instantiated
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl PluginOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Value::Null,
            enforce: None,
            enabled: true,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_enforce(mut self, enforce: PluginEnforce) -> Self {
        self.enforce = Some(enforce);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginEnforce {
    Pre,
    Post,
}
