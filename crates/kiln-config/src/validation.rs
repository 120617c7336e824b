//! Pluggable config validation strategies
//!
//! Separates filesystem validation from schema validation so in-memory
//! configurations can be checked without touching the disk.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use kiln_config::{ConfigValidator, KilnConfig, SchemaValidator};
///
/// let config = KilnConfig::default().with_alias("@", "src");
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()> {
        for prefix in config.resolve.alias.keys() {
            if prefix.is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "alias prefixes cannot be empty".to_string(),
                    hint: Some("Remove the empty key from 'resolve.alias'".to_string()),
                });
            }
        }

        for (prefix, target) in &config.resolve.alias {
            if target.as_os_str().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("alias '{prefix}' has an empty target"),
                    hint: Some("Point the alias at a directory".to_string()),
                });
            }
        }

        if config.build.out_dir.as_os_str().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "build.outDir cannot be empty".to_string(),
                hint: Some("Use \"dist\" or another directory name".to_string()),
            });
        }

        let mut seen = HashSet::new();
        for plugin in &config.plugins {
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "plugin name cannot be empty".to_string(),
                    hint: Some("Specify the registered name of each plugin".to_string()),
                });
            }
            if !seen.insert(plugin.name.as_str()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("plugin '{}' is listed more than once", plugin.name),
                    hint: None,
                });
            }
        }

        if let Some(manifest) = &config.build.manifest {
            if !is_plain_file_name(manifest) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("manifest file name '{manifest}' is not a plain file name"),
                    hint: Some("Use a name like \"manifest.json\" without directories".to_string()),
                });
            }
        }

        Ok(())
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Filesystem validator
///
/// Runs schema validation, then checks that every alias target exists on disk.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    /// Create a new filesystem validator with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let root = match &config.root {
            Some(root) => self.root.join(root).clean(),
            None => self.root.clone(),
        };

        for (prefix, target) in &config.resolve.alias {
            let path = root.join(target).clean();
            if !path.exists() {
                return Err(ConfigError::AliasTargetNotFound {
                    prefix: prefix.clone(),
                    path,
                });
            }
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &KilnConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Convenience function for filesystem validation
pub fn validate_fs(config: &KilnConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
