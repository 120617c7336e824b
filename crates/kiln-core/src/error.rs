use std::path::PathBuf;

use crate::output::OutputState;

/// Error types for kiln-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unsafe settings, detected when rules or plugins are configured.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A resolved path would leave the directory it must stay inside.
    #[error("Path escape: '{specifier}' resolves outside '{}'", .root.display())]
    PathEscape { specifier: String, root: PathBuf },

    /// The output directory targets a disallowed location.
    #[error("Unsafe output directory '{}': {reason}", .path.display())]
    UnsafeDirectory { path: PathBuf, reason: String },

    /// Underlying filesystem failure.
    #[error("I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation called out of prepare → emit → finalize order.
    #[error("Invalid state: cannot {operation} while output is {state}")]
    InvalidState {
        operation: &'static str,
        state: OutputState,
    },

    /// A plugin extension point failed.
    #[error("Plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// Error from the configuration crate.
    #[error("Config error: {0}")]
    Config(#[from] kiln_config::ConfigError),
}

/// Result type alias for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Configuration { .. } => "CONFIGURATION_ERROR",
            Error::PathEscape { .. } => "PATH_ESCAPE",
            Error::UnsafeDirectory { .. } => "UNSAFE_DIRECTORY",
            Error::Io { .. } => "IO_ERROR",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::Plugin { .. } => "PLUGIN_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::PathEscape { specifier, root } => Some(Box::new(format!(
                "'{}' uses '..' to leave '{}'. Keep aliased imports and emitted files inside their root.",
                specifier,
                root.display()
            ))),
            Error::UnsafeDirectory { path, .. } => Some(Box::new(format!(
                "Point build.outDir somewhere inside the project boundary instead of '{}', or set build.boundary.",
                path.display()
            ))),
            Error::InvalidState { .. } => Some(Box::new(
                "A build pass runs prepare once, then emit for each file, then finalize once.",
            )),
            Error::Io { path, .. } => Some(Box::new(format!(
                "Check permissions and free space for '{}'.",
                path.display()
            ))),
            _ => None,
        }
    }
}
