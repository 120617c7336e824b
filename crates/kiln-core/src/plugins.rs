//! Plugin capability and registry with execution phases.
//!
//! The core never knows which concrete plugins it is running. Each plugin
//! implements [`Plugin`] and is invoked at two extension points: rewriting an
//! import specifier before alias resolution, and transforming an emitted
//! asset before it is written.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kiln_config::{PluginEnforce, PluginOptions};
use serde_json::Value;

use crate::output::EmittedAsset;
use crate::{Error, Result};

/// Plugin execution phases
///
/// Plugins run in phase order (lower numbers first); within a phase they keep
/// the order they were declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginPhase {
    /// Runs before unmarked plugins (`enforce = "pre"`)
    Pre = 0,
    /// Default phase
    Normal = 10,
    /// Runs after unmarked plugins (`enforce = "post"`)
    Post = 20,
}

impl From<Option<PluginEnforce>> for PluginPhase {
    fn from(enforce: Option<PluginEnforce>) -> Self {
        match enforce {
            Some(PluginEnforce::Pre) => PluginPhase::Pre,
            Some(PluginEnforce::Post) => PluginPhase::Post,
            None => PluginPhase::Normal,
        }
    }
}

/// A transform plugin.
///
/// Every hook has a no-op default, so a plugin only implements the extension
/// points it cares about.
pub trait Plugin: Send + Sync {
    /// Plugin name for logging and error reports
    fn name(&self) -> Cow<'static, str>;

    /// Execution phase; defaults to `Normal`
    fn phase(&self) -> PluginPhase {
        PluginPhase::Normal
    }

    /// Rewrite an import specifier. `None` leaves it unchanged.
    fn resolve_specifier(&self, _specifier: &str) -> Option<String> {
        None
    }

    /// Transform an emitted file before it is written.
    fn transform_asset(&self, _asset: &mut EmittedAsset) -> Result<()> {
        Ok(())
    }
}

pub type SharedPlugin = Arc<dyn Plugin>;

/// Plugin registry that maintains plugins in phase order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, SharedPlugin)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin at the phase it declares.
    pub fn add<P: Plugin + 'static>(&mut self, plugin: P) {
        let phase = plugin.phase();
        self.plugins.push((phase, Arc::new(plugin)));
    }

    /// Add a plugin with an explicit phase, overriding the one it declares.
    pub fn add_with_phase(&mut self, plugin: SharedPlugin, phase: PluginPhase) {
        self.plugins.push((phase, plugin));
    }

    /// Plugins sorted by phase.
    ///
    /// The sort is stable, so declaration order holds within each phase.
    pub fn into_ordered(mut self) -> Vec<SharedPlugin> {
        self.plugins.sort_by_key(|(phase, _)| *phase);
        self.plugins.into_iter().map(|(_, plugin)| plugin).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|(phase, p)| (phase, p.name())))
            .finish()
    }
}

type PluginFactory = Box<dyn Fn(&Value) -> Result<SharedPlugin> + Send + Sync>;

/// Named plugin constructors, used to instantiate the `plugins` list of a
/// configuration.
#[derive(Default)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`. A later registration replaces an earlier one.
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_core::{Plugin, PluginCatalog};
    /// use std::borrow::Cow;
    /// use std::sync::Arc;
    ///
    /// struct Vue;
    /// impl Plugin for Vue {
    ///     fn name(&self) -> Cow<'static, str> {
    ///         "vue".into()
    ///     }
    /// }
    ///
    /// let mut catalog = PluginCatalog::new();
    /// catalog.register("vue", |_options| Ok(Arc::new(Vue)));
    /// assert!(catalog.contains("vue"));
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<SharedPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the enabled entries of a `plugins` list, in phase order.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for a name nobody registered; factory errors
    /// are passed through.
    pub fn instantiate(&self, options: &[PluginOptions]) -> Result<Vec<SharedPlugin>> {
        let mut registry = PluginRegistry::new();

        for entry in options.iter().filter(|entry| entry.enabled) {
            let factory = self.factories.get(&entry.name).ok_or_else(|| {
                Error::configuration(format!("unknown plugin '{}'", entry.name))
            })?;
            let plugin = factory(&entry.options)?;
            let phase = match entry.enforce {
                Some(_) => PluginPhase::from(entry.enforce),
                None => plugin.phase(),
            };
            registry.add_with_phase(plugin, phase);
        }

        Ok(registry.into_ordered())
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}
