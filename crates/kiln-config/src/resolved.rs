//! Settings after every path has been made absolute.

use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::PluginOptions;

/// Configuration with absolute, normalized paths, ready to hand to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub root: PathBuf,
    /// Always ends in `/`
    pub base: String,
    pub out_dir: PathBuf,
    pub empty_out_dir: bool,
    pub boundary: PathBuf,
    pub manifest: Option<String>,
    /// Alias rules in declaration order
    pub aliases: Vec<(String, PathBuf)>,
    pub plugins: Vec<PluginOptions>,
}

/// Normalize a public base path so it always ends in a separator.
///
/// An empty base becomes `/`.
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        tracing::debug!(base = trimmed, "appending trailing '/' to base");
        format!("{trimmed}/")
    }
}

/// Find the workspace root by walking up from `start`.
///
/// A directory is considered a workspace root if it contains:
/// - pnpm-workspace.yaml (pnpm workspaces)
/// - lerna.json (Lerna monorepo)
/// - package.json with "workspaces" field (npm/yarn workspaces)
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;

    loop {
        if current.join("pnpm-workspace.yaml").is_file() {
            return Some(current.to_path_buf());
        }

        if current.join("lerna.json").is_file() {
            return Some(current.to_path_buf());
        }

        if let Ok(content) = fs::read_to_string(current.join("package.json")) {
            if let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&content) {
                if pkg.get("workspaces").is_some() {
                    return Some(current.to_path_buf());
                }
            }
        }

        current = current.parent()?;
    }
}
