//! Secure file writing for emitted assets.
//!
//! Every relative path is validated so it cannot climb out of the output
//! directory, and file contents are written to a temporary sibling first and
//! then renamed into place, so readers never observe a half-written file.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use super::directory::canonicalize_lossy;
use crate::{Error, Result};

/// Validates an emitted file's relative path against the output directory.
///
/// # Security
///
/// This function prevents attacks like:
/// - `../../../etc/passwd` - escaping the output directory
/// - `/etc/passwd` - absolute paths outside output directory
/// - `dir/../../../etc/passwd` - complex traversal patterns
///
/// It works by:
/// 1. Rejecting absolute paths and NUL bytes outright
/// 2. Joining the cleaned relative path onto the base directory
/// 3. Cleaning the result again to resolve any remaining `..`
/// 4. Checking that the final path is still strictly under the base directory
/// 5. Repeating that check with symlinks resolved for the existing part of the path
pub(crate) fn validate_output_path(base_dir: &Path, relative: &str) -> Result<PathBuf> {
    let escape = || Error::PathEscape {
        specifier: relative.to_string(),
        root: base_dir.to_path_buf(),
    };

    if relative.contains('\0') {
        return Err(escape());
    }

    let relative_path = Path::new(relative);
    if relative_path.is_absolute() || relative_path.has_root() {
        return Err(escape());
    }

    #[cfg(target_os = "windows")]
    {
        let stem = relative_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_uppercase();
        let device_names = [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ];
        if device_names.contains(&stem.as_str()) {
            return Err(escape());
        }
    }

    let full_path = base_dir.join(relative_path.clean()).clean();

    // The directory itself is not a file target.
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(escape());
    }

    // Symlinks already inside the directory must not carry the write elsewhere.
    let real_base = canonicalize_lossy(base_dir);
    let real_target = canonicalize_lossy(&full_path);
    if !real_target.starts_with(&real_base) || real_target == real_base {
        return Err(escape());
    }

    Ok(full_path)
}

/// Writes `contents` to `target` through a temporary file and a rename.
///
/// Parent directories are created as needed. On failure the temporary file
/// is removed and the previous contents of `target`, if any, are untouched.
pub(crate) fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_path = temp_path_for(target);
    if let Err(e) = fs::write(&temp_path, contents) {
        cleanup_temp_file(&temp_path);
        return Err(Error::io(&temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        cleanup_temp_file(&temp_path);
        return Err(Error::io(target, e));
    }

    Ok(())
}

/// `index.html` → `.index.html.kiln-tmp`, in the same directory so the
/// rename never crosses filesystems.
fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.kiln-tmp"))
}

/// Best-effort cleanup; we're already in an error state.
fn cleanup_temp_file(temp_path: &Path) {
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(temp_path) {
            tracing::warn!(
                path = %temp_path.display(),
                error = %e,
                "failed to clean up temporary file"
            );
        }
    }
}
