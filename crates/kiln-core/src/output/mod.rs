//! Output directory lifecycle for a build pass.
//!
//! A pass is `prepare` once, `emit` for every file, then `finalize` once:
//!
//! ```text
//! Unprepared ──prepare──▶ Prepared ──finalize──▶ Finalized
//!                          │    ▲                   │
//!                          └emit┘                   └──prepare──▶ Prepared …
//! ```
//!
//! While a pass is active the manager holds an exclusive lock on the output
//! directory, so two builds can never interleave writes into the same tree.

mod directory;
mod manifest;
mod url;
mod writer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::{normalize_base, ResolvedConfig};
use parking_lot::Mutex;

use crate::{Error, Result};
use directory::{
    canonicalize_lossy, check_directory_safety, clear_directory, DirLock, LOCK_FILE_NAME,
};
use url::rewrite_references;
use writer::{validate_output_path, write_atomic};

pub use manifest::{BuildManifest, ManifestEntry};
pub use url::{is_external_url, rebase_url};

/// Where the output manager is in the prepare → emit → finalize cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputState {
    #[default]
    Unprepared,
    Prepared,
    Finalized,
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputState::Unprepared => "unprepared",
            OutputState::Prepared => "prepared",
            OutputState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Settings for one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Absolute output directory
    pub directory: PathBuf,
    /// URL prefix for emitted references; ends in `/`
    pub base_path: String,
    /// Remove existing entries during `prepare`
    pub clear_before_write: bool,
    /// Tree the directory must stay inside
    pub boundary: PathBuf,
    /// Write the manifest as JSON under this name when the pass finalizes
    pub manifest_file: Option<String>,
}

impl OutputConfig {
    /// Settings for `directory`, which must lie inside `boundary`.
    pub fn new(
        directory: impl Into<PathBuf>,
        base_path: &str,
        boundary: impl Into<PathBuf>,
    ) -> Self {
        Self {
            directory: directory.into(),
            base_path: normalize_base(base_path),
            clear_before_write: false,
            boundary: boundary.into(),
            manifest_file: None,
        }
    }

    pub fn with_clear_before_write(mut self, clear: bool) -> Self {
        self.clear_before_write = clear;
        self
    }

    pub fn with_manifest_file(mut self, name: impl Into<String>) -> Self {
        self.manifest_file = Some(name.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.directory.is_absolute() {
            return Err(Error::configuration(format!(
                "output directory must be absolute, got '{}'",
                self.directory.display()
            )));
        }
        if !self.base_path.ends_with('/') {
            return Err(Error::configuration(format!(
                "base path '{}' must end with '/'",
                self.base_path
            )));
        }
        if !self.boundary.is_absolute() {
            return Err(Error::configuration(format!(
                "project boundary must be absolute, got '{}'",
                self.boundary.display()
            )));
        }
        if let Some(name) = &self.manifest_file {
            let mut components = Path::new(name).components();
            let plain = matches!(
                (components.next(), components.next()),
                (Some(std::path::Component::Normal(_)), None)
            );
            if !plain || name == LOCK_FILE_NAME {
                return Err(Error::configuration(format!(
                    "manifest file '{name}' must be a plain file name"
                )));
            }
        }
        Ok(())
    }
}

impl From<&ResolvedConfig> for OutputConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            directory: config.out_dir.clone(),
            base_path: config.base.clone(),
            clear_before_write: config.empty_out_dir,
            boundary: config.boundary.clone(),
            manifest_file: config.manifest.clone(),
        }
    }
}

/// A file produced by the transform pipeline, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Path relative to the output directory
    pub relative_path: String,
    pub contents: Vec<u8>,
    /// URLs the contents refer to, in order of appearance
    pub referenced_urls: Vec<String>,
}

impl EmittedAsset {
    pub fn new(relative_path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents: contents.into(),
            referenced_urls: Vec::new(),
        }
    }

    pub fn with_references<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referenced_urls = urls.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug)]
struct ActivePass {
    config: OutputConfig,
    directory: PathBuf,
    manifest: BuildManifest,
    lock: DirLock,
}

/// Owns the output directory for one build pass at a time.
#[derive(Debug, Default)]
pub struct OutputManager {
    state: OutputState,
    pass: Option<ActivePass>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Canonical output directory of the active pass.
    pub fn directory(&self) -> Option<&Path> {
        self.pass.as_ref().map(|pass| pass.directory.as_path())
    }

    /// Start a build pass.
    ///
    /// Validates `config`, creates and locks the directory, and empties it
    /// when `clear_before_write` is set.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if a pass is already active
    /// - [`Error::Configuration`] for a relative directory or a malformed base path
    /// - [`Error::UnsafeDirectory`] if the directory is the filesystem root or lies
    ///   outside the boundary; when clearing, also if it is a top-level directory
    ///   or would take the boundary or the home directory with it
    /// - [`Error::Io`] on any filesystem failure, including a lock held by another pass
    pub fn prepare(&mut self, config: OutputConfig) -> Result<()> {
        if self.state == OutputState::Prepared {
            return Err(Error::InvalidState {
                operation: "prepare",
                state: self.state,
            });
        }

        config.validate()?;

        let directory = canonicalize_lossy(&config.directory);
        let boundary = canonicalize_lossy(&config.boundary);
        check_directory_safety(&directory, &boundary, config.clear_before_write)?;

        std::fs::create_dir_all(&directory).map_err(|e| Error::io(&directory, e))?;
        let lock = DirLock::acquire(&directory)?;

        if config.clear_before_write {
            let removed = clear_directory(&directory)?;
            tracing::debug!(dir = %directory.display(), removed, "emptied output directory");
        }

        tracing::info!(
            dir = %directory.display(),
            base = %config.base_path,
            "output directory prepared"
        );

        self.pass = Some(ActivePass {
            manifest: BuildManifest::new(&directory, &config.base_path),
            directory,
            config,
            lock,
        });
        self.state = OutputState::Prepared;
        Ok(())
    }

    /// Write one asset into the output directory.
    ///
    /// Referenced URLs are rebased onto the base path, in the asset record and,
    /// for UTF-8 contents, inside the contents. Returns the absolute path written.
    pub fn emit(&mut self, asset: EmittedAsset) -> Result<PathBuf> {
        let state = self.state;
        let pass = match (state, self.pass.as_mut()) {
            (OutputState::Prepared, Some(pass)) => pass,
            _ => {
                return Err(Error::InvalidState {
                    operation: "emit",
                    state,
                })
            }
        };

        let target = validate_output_path(&pass.directory, &asset.relative_path)?;
        let relative = to_manifest_path(&pass.directory, &target);
        let reserved = relative == LOCK_FILE_NAME
            || pass.config.manifest_file.as_deref() == Some(relative.as_str());
        if reserved {
            return Err(Error::configuration(format!(
                "'{relative}' is reserved in the output directory"
            )));
        }

        let rewrites: Vec<(String, String)> = asset
            .referenced_urls
            .iter()
            .map(|url| (url.clone(), rebase_url(url, &pass.config.base_path)))
            .collect();

        let rewritten = match std::str::from_utf8(&asset.contents) {
            Ok(text) if rewrites.iter().any(|(from, to)| from != to) => {
                Some(rewrite_references(text, &rewrites).into_bytes())
            }
            _ => None,
        };
        let contents = rewritten.unwrap_or(asset.contents);

        write_atomic(&target, &contents)?;
        tracing::debug!(path = %relative, size = contents.len(), "emitted");

        pass.manifest.record(ManifestEntry {
            path: relative,
            size: contents.len() as u64,
            references: rewrites.into_iter().map(|(_, to)| to).collect(),
        });

        Ok(target)
    }

    /// Finish the pass, release the directory, and return what was written.
    ///
    /// If the manifest file cannot be written the pass stays `Prepared`.
    pub fn finalize(&mut self) -> Result<BuildManifest> {
        let state = self.state;
        let pass = match (state, self.pass.take()) {
            (OutputState::Prepared, Some(pass)) => pass,
            (_, pass) => {
                self.pass = pass;
                return Err(Error::InvalidState {
                    operation: "finalize",
                    state,
                });
            }
        };

        // A failed manifest write leaves the pass open so finalize can be retried.
        let manifest_path = pass
            .config
            .manifest_file
            .as_ref()
            .map(|name| pass.directory.join(name));
        if let Some(path) = manifest_path {
            let written = serde_json::to_vec_pretty(&pass.manifest)
                .map_err(|e| Error::io(&path, std::io::Error::other(e)))
                .and_then(|json| write_atomic(&path, &json));
            if let Err(e) = written {
                self.pass = Some(pass);
                return Err(e);
            }
        }

        let ActivePass {
            directory,
            manifest,
            lock,
            ..
        } = pass;
        drop(lock);
        self.state = OutputState::Finalized;

        tracing::info!(
            dir = %directory.display(),
            files = manifest.len(),
            bytes = manifest.total_size(),
            "build pass finalized"
        );

        Ok(manifest)
    }
}

/// `/`-separated path of `target` relative to `directory`.
fn to_manifest_path(directory: &Path, target: &Path) -> String {
    target
        .strip_prefix(directory)
        .unwrap_or(target)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// An [`OutputManager`] behind a mutex, for emitting from several workers.
///
/// Every call takes the lock, so writes and manifest order are serialized
/// through a single owner.
#[derive(Debug, Clone, Default)]
pub struct SharedOutputManager {
    inner: Arc<Mutex<OutputManager>>,
}

impl SharedOutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OutputState {
        self.inner.lock().state()
    }

    pub fn prepare(&self, config: OutputConfig) -> Result<()> {
        self.inner.lock().prepare(config)
    }

    pub fn emit(&self, asset: EmittedAsset) -> Result<PathBuf> {
        self.inner.lock().emit(asset)
    }

    pub fn finalize(&self) -> Result<BuildManifest> {
        self.inner.lock().finalize()
    }
}
