#![cfg_attr(docsrs, feature(doc_cfg))]

//! # kiln-core
//!
//! Import alias resolution and output directory management for kiln builds.
//!
//! A host loads a [`kiln_config::ResolvedConfig`] once, builds a
//! [`BuildSession`], and drives one build pass through it: `begin`, then
//! `resolve`/`emit` for every module and asset, then `finish`.
//!
//! ```no_run
//! use kiln_core::{BuildSession, EmittedAsset, PluginCatalog};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = kiln_config::discover()?;
//! let session = BuildSession::new(&config, &PluginCatalog::new())?;
//!
//! let app = session.resolve("@/App.vue")?;
//! println!("App.vue lives at {:?}", app.path());
//!
//! session.begin()?;
//! session.emit(
//!     EmittedAsset::new("index.html", r#"<script src="/assets/index.js"></script>"#)
//!         .with_references(["/assets/index.js"]),
//! )?;
//! let manifest = session.finish()?;
//! for path in manifest.paths() {
//!     println!("wrote {path}");
//! }
//! # Ok(()) }
//! ```
//!
//! The pieces are usable on their own: [`AliasResolver`] for specifier
//! rewriting, [`OutputManager`] for a locked, bounded output directory.

pub mod alias;
mod error;
pub mod output;
pub mod plugins;
pub mod session;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use alias::{AliasResolver, AliasRule, Resolution};
pub use error::{Error, Result};
pub use output::{
    BuildManifest, EmittedAsset, ManifestEntry, OutputConfig, OutputManager, OutputState,
    SharedOutputManager,
};
pub use plugins::{Plugin, PluginCatalog, PluginPhase, PluginRegistry, SharedPlugin};
pub use session::BuildSession;
