//! File-based config discovery
//!
//! Handles finding kiln configuration files and layering environment
//! overrides on top of them.

use std::fs;
use std::path::{Path, PathBuf};

use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;
use serde_json::Value;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};
use crate::resolved::ResolvedConfig;
use crate::validation::validate_schema;

/// File-based configuration discovery
///
/// Searches for kiln configuration files in conventional locations and loads them.
/// Library users can skip this and call `KilnConfig::from_value()` directly.
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    /// Create a new config discovery with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. kiln.toml
    /// 2. kiln.json
    /// 3. package.json (kiln field)
    pub fn find(&self) -> Option<PathBuf> {
        for name in ["kiln.toml", "kiln.json"] {
            let path = self.root.join(name);
            if path.is_file() {
                return Some(path);
            }
        }

        let pkg_path = self.root.join("package.json");
        if let Ok(content) = fs::read_to_string(&pkg_path) {
            if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                if parsed.get("kiln").is_some_and(|v| !v.is_null()) {
                    return Some(pkg_path);
                }
            }
        }

        None
    }

    /// Load config from discovered file, with environment overrides applied
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<KilnConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        load_file(&path)
    }

    /// Load config, check its schema, and resolve its paths against the
    /// directory it was found in
    pub fn load_resolved(&self) -> Result<ResolvedConfig> {
        let config = self.load()?;
        validate_schema(&config)?;
        config.resolve_paths(&self.root)
    }
}

/// Load a specific config file (`.toml`, `.json`, or a `package.json` with a `kiln` field).
///
/// Map keys keep the order they were written in, which makes `resolve.alias`
/// match in declaration order. `KILN_*` environment overrides are applied on top.
pub fn load_file(path: &Path) -> Result<KilnConfig> {
    let value = if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
        package_json_section(path)?
    } else {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml_value(path)?,
            Some("json") => json_value(path)?,
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: path.display().to_string(),
                    hint: Some("Use a .toml or .json config file".to_string()),
                })
            }
        }
    };

    tracing::debug!(path = %path.display(), "loading config");

    let mut config = KilnConfig::from_value(value).map_err(|e| match e {
        ConfigError::InvalidValue { hint, .. } => ConfigError::InvalidValue {
            field: path.display().to_string(),
            hint,
        },
        other => other,
    })?;
    EnvOverrides::load()?.apply(&mut config);
    Ok(config)
}

fn toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;

    let toml_val: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: path.display().to_string(),
        hint: Some(format!("Invalid TOML syntax: {e}")),
    })?;

    serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
        field: path.display().to_string(),
        hint: Some(format!("TOML to JSON conversion failed: {e}")),
    })
}

fn json_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;

    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: path.display().to_string(),
        hint: Some(format!("Invalid JSON: {e}")),
    })
}

fn package_json_section(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;

    let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: "package.json".to_string(),
        hint: Some(format!("Invalid JSON: {e}")),
    })?;

    match parsed.get("kiln") {
        Some(value) if !value.is_null() => Ok(value.clone()),
        Some(_) => Err(ConfigError::InvalidValue {
            field: "kiln".to_string(),
            hint: Some("The 'kiln' field cannot be null".to_string()),
        }),
        None => Err(ConfigError::InvalidValue {
            field: "kiln".to_string(),
            hint: Some("Add a 'kiln' field to your package.json".to_string()),
        }),
    }
}

/// Scalar settings that `KILN_BASE`, `KILN_ROOT`, `KILN_OUT_DIR` and
/// `KILN_EMPTY_OUT_DIR` can override.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    base: Option<String>,
    root: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    empty_out_dir: Option<bool>,
}

impl EnvOverrides {
    fn load() -> Result<Self> {
        Figment::from(Env::prefixed("KILN_").only(&["base", "root", "out_dir", "empty_out_dir"]))
            .extract()
            .map_err(|e| ConfigError::InvalidValue {
                field: "KILN_* environment".to_string(),
                hint: Some(e.to_string()),
            })
    }

    fn apply(self, config: &mut KilnConfig) {
        if let Some(base) = self.base {
            config.base = base;
        }
        if let Some(root) = self.root {
            config.root = Some(root);
        }
        if let Some(out_dir) = self.out_dir {
            config.build.out_dir = out_dir;
        }
        if let Some(empty_out_dir) = self.empty_out_dir {
            config.build.empty_out_dir = Some(empty_out_dir);
        }
    }
}

/// Discover and load config from the current directory (convenience function)
///
/// # Example
///
/// ```no_run
/// use kiln_config::discover;
///
/// let config = discover().unwrap();
/// ```
pub fn discover() -> Result<ResolvedConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load_resolved()
}
