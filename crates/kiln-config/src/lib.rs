//! Configuration for kiln builds.
//!
//! A [`KilnConfig`] is the static settings object read once at build startup:
//! public base path, output directory and its clearing policy, import aliases,
//! and the plugin list. [`KilnConfig::resolve_paths`] turns it into a
//! [`ResolvedConfig`] whose paths are all absolute.

mod helpers;

pub mod config;
pub mod discovery;
pub mod error;
pub mod plugin;
pub mod resolved;
pub mod validation;

// Re-export main types
pub use config::*;
pub use error::*;
pub use plugin::*;
pub use resolved::*;

// Re-export discovery and validation
pub use discovery::{discover, load_file, ConfigDiscovery};
pub use validation::{validate_fs, validate_schema, ConfigValidator, FsValidator, SchemaValidator};
