//! The static settings object consumed once at build startup.
//!
//! This module provides the main `KilnConfig` struct and its conversion into a
//! [`ResolvedConfig`] with absolute paths. For file discovery, see the
//! `discovery` module.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};
use crate::helpers::{default_base, default_out_dir};
use crate::plugin::PluginOptions;
use crate::resolved::{find_workspace_root, normalize_base, ResolvedConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KilnConfig {
    /// Project root. Relative paths below resolve against it.
    /// Defaults to the directory holding the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Public base path prepended to emitted asset URLs (e.g. "./" or "/app/")
    #[serde(default = "default_base")]
    pub base: String,

    #[serde(default)]
    pub build: BuildOptions,

    #[serde(default)]
    pub resolve: ResolveOptions,

    /// Transform plugins, in declaration order
    #[serde(default)]
    pub plugins: Vec<PluginOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    /// Output directory, relative to the project root
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Remove everything in `out_dir` before writing.
    /// When unset, the directory is only emptied if it lives inside the root.
    #[serde(
        default,
        alias = "clearBeforeWrite",
        skip_serializing_if = "Option::is_none"
    )]
    pub empty_out_dir: Option<bool>,

    /// Directory tree the output directory must stay inside
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<PathBuf>,

    /// File name of the JSON manifest written after a build pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            empty_out_dir: None,
            boundary: None,
            manifest: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Import prefix → directory. Declaration order is the match order.
    #[serde(default)]
    pub alias: IndexMap<String, PathBuf>,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            root: None,
            base: default_base(),
            build: BuildOptions::default(),
            resolve: ResolveOptions::default(),
            plugins: Vec::new(),
        }
    }
}

impl KilnConfig {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_config::KilnConfig;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let value = json!({
    ///     "base": "./",
    ///     "build": { "outDir": "../../docs", "emptyOutDir": true },
    ///     "resolve": { "alias": { "@": "./src" } }
    /// });
    ///
    /// let config = KilnConfig::from_value(value).unwrap();
    /// assert_eq!(config.build.out_dir, PathBuf::from("../../docs"));
    /// assert_eq!(config.build.empty_out_dir, Some(true));
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Append an alias rule. Rules added later match after earlier ones.
    ///
    /// # Example
    /// ```
    /// use kiln_config::KilnConfig;
    ///
    /// let config = KilnConfig::default()
    ///     .with_alias("@components", "src/components")
    ///     .with_alias("@", "src");
    /// assert_eq!(config.resolve.alias.get_index(0).unwrap().0, "@components");
    /// ```
    pub fn with_alias(mut self, prefix: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        self.resolve.alias.insert(prefix.into(), target.into());
        self
    }

    pub fn with_plugin(mut self, plugin: PluginOptions) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Turn every configured path into an absolute, normalized one.
    ///
    /// `config_dir` is the directory the settings came from; a relative
    /// `config_dir` is taken relative to the current working directory.
    pub fn resolve_paths(&self, config_dir: impl AsRef<Path>) -> ConfigResult<ResolvedConfig> {
        let config_dir = config_dir.as_ref();
        let config_dir = if config_dir.is_absolute() {
            config_dir.clean()
        } else {
            std::env::current_dir()?.join(config_dir).clean()
        };

        let root = match &self.root {
            Some(root) => config_dir.join(root).clean(),
            None => config_dir,
        };

        let out_dir = root.join(&self.build.out_dir).clean();

        let empty_out_dir = match self.build.empty_out_dir {
            Some(explicit) => explicit,
            None => {
                let inside = out_dir.starts_with(&root) && out_dir != root;
                if !inside {
                    tracing::warn!(
                        out_dir = %out_dir.display(),
                        root = %root.display(),
                        "outDir is not inside the project root and will not be emptied; set build.emptyOutDir to override"
                    );
                }
                inside
            }
        };

        let boundary = match &self.build.boundary {
            Some(boundary) => root.join(boundary).clean(),
            None => find_workspace_root(&root).unwrap_or_else(|| root.clone()),
        };

        let aliases = self
            .resolve
            .alias
            .iter()
            .map(|(prefix, target)| (prefix.clone(), root.join(target).clean()))
            .collect();

        Ok(ResolvedConfig {
            base: normalize_base(&self.base),
            root,
            out_dir,
            empty_out_dir,
            boundary,
            manifest: self.build.manifest.clone(),
            aliases,
            plugins: self.plugins.clone(),
        })
    }
}
