use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One file written during a build pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the output directory, always `/`-separated
    pub path: String,
    /// Size in bytes of the last write
    pub size: u64,
    /// Referenced URLs after rebasing onto the base path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Ordered record of the files written during one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub directory: PathBuf,
    pub base: String,
    pub entries: Vec<ManifestEntry>,
}

impl BuildManifest {
    pub(crate) fn new(directory: &Path, base: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            base: base.to_string(),
            entries: Vec::new(),
        }
    }

    /// Record a write. A path written twice keeps its first position and
    /// the details of the last write.
    pub(crate) fn record(&mut self, entry: ManifestEntry) {
        match self.entries.iter_mut().find(|e| e.path == entry.path) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Relative paths in emission order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}
