//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Config parsing/loading errors
    #[error("config not found")]
    NotFound,

    #[error("invalid config value for '{field}'{}", format_hint(.hint))]
    InvalidValue { field: String, hint: Option<String> },

    // Schema validation errors (no filesystem checks)
    #[error("schema validation failed: {message}{}", format_hint(.hint))]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    // Filesystem validation errors
    #[error("alias '{prefix}' points to a missing path: {}", .path.display())]
    AliasTargetNotFound { prefix: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_hint(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!(" ({hint})"),
        None => String::new(),
    }
}
