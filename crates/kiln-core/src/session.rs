//! Host-side wiring of resolver, plugins and output for one project.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kiln_config::ResolvedConfig;
use tracing::{debug, info, info_span};

use crate::alias::{AliasResolver, AliasRule, Resolution};
use crate::output::{
    BuildManifest, EmittedAsset, OutputConfig, OutputState, SharedOutputManager,
};
use crate::plugins::{PluginCatalog, SharedPlugin};
use crate::{Error, Result};

/// Everything a build needs, configured once from a [`ResolvedConfig`].
///
/// All methods take `&self`; a session can be shared by worker threads that
/// resolve and emit concurrently.
#[derive(Clone)]
pub struct BuildSession {
    resolver: Arc<AliasResolver>,
    plugins: Vec<SharedPlugin>,
    output: SharedOutputManager,
    output_config: OutputConfig,
}

impl BuildSession {
    /// Configure alias rules, instantiate plugins and set up the output manager.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an invalid alias rule or an unknown plugin.
    pub fn new(config: &ResolvedConfig, catalog: &PluginCatalog) -> Result<Self> {
        let rules = config
            .aliases
            .iter()
            .map(|(prefix, target)| AliasRule::new(prefix.clone(), target))
            .collect::<Result<Vec<_>>>()?;
        let mut resolver = AliasResolver::new();
        resolver.configure(rules)?;

        let plugins = catalog.instantiate(&config.plugins)?;
        debug!(
            aliases = resolver.rules().len(),
            plugins = plugins.len(),
            root = %config.root.display(),
            "build session configured"
        );

        Ok(Self {
            resolver: Arc::new(resolver),
            plugins,
            output: SharedOutputManager::new(),
            output_config: OutputConfig::from(config),
        })
    }

    pub fn resolver(&self) -> &Arc<AliasResolver> {
        &self.resolver
    }

    pub fn output(&self) -> &SharedOutputManager {
        &self.output
    }

    pub fn output_config(&self) -> &OutputConfig {
        &self.output_config
    }

    pub fn plugins(&self) -> &[SharedPlugin] {
        &self.plugins
    }

    /// Resolve an import specifier.
    ///
    /// Each plugin may rewrite the specifier in turn; the final form goes
    /// through the alias rules.
    pub fn resolve(&self, specifier: &str) -> Result<Resolution> {
        let mut current = specifier.to_string();
        for plugin in &self.plugins {
            if let Some(rewritten) = plugin.resolve_specifier(&current) {
                debug!(plugin = %plugin.name(), from = %current, to = %rewritten, "specifier rewritten");
                current = rewritten;
            }
        }

        let resolution = self.resolver.resolve(&current)?;
        debug!(specifier, resolved = ?resolution.path(), "resolved");
        Ok(resolution)
    }

    /// Start a build pass.
    pub fn begin(&self) -> Result<()> {
        let _span = info_span!("build_pass", dir = %self.output_config.directory.display()).entered();
        self.output.prepare(self.output_config.clone())?;
        info!(plugins = self.plugins.len(), "build pass started");
        Ok(())
    }

    /// Run every plugin's asset transform, then write the result.
    ///
    /// # Errors
    ///
    /// [`Error::Plugin`] names the failing plugin; output errors pass through.
    /// Nothing is written when a transform fails.
    pub fn emit(&self, mut asset: EmittedAsset) -> Result<PathBuf> {
        let state = self.output.state();
        if state != OutputState::Prepared {
            return Err(Error::InvalidState {
                operation: "emit",
                state,
            });
        }

        for plugin in &self.plugins {
            plugin
                .transform_asset(&mut asset)
                .map_err(|e| match e {
                    err @ Error::Plugin { .. } => err,
                    other => Error::Plugin {
                        plugin: plugin.name().into_owned(),
                        message: other.to_string(),
                    },
                })?;
        }

        self.output.emit(asset)
    }

    /// Finish the pass and return the manifest.
    pub fn finish(&self) -> Result<BuildManifest> {
        let manifest = self.output.finalize()?;
        info!(
            files = manifest.len(),
            dir = %manifest.directory.display(),
            "build pass finished"
        );
        Ok(manifest)
    }
}

impl fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSession")
            .field("resolver", &self.resolver)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("output_config", &self.output_config)
            .finish_non_exhaustive()
    }
}
