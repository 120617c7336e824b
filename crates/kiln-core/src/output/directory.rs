//! Output directory safety checks, clearing and locking.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use path_clean::PathClean;

use crate::{Error, Result};

/// Lock file kept inside the output directory while a pass owns it.
pub(crate) const LOCK_FILE_NAME: &str = ".kiln-lock";

/// Resolve symlinks for the part of `path` that exists and append the rest.
///
/// The output directory usually does not exist yet, so a plain
/// `canonicalize()` would fail; normalizing lexically alone would miss a
/// symlinked ancestor pointing somewhere else.
pub(crate) fn canonicalize_lossy(path: &Path) -> PathBuf {
    let cleaned = path.clean();
    let mut existing = cleaned.as_path();
    let mut tail: Vec<OsString> = Vec::new();

    loop {
        if let Ok(mut canonical) = existing.canonicalize() {
            for part in tail.iter().rev() {
                canonical.push(part);
            }
            return canonical;
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return cleaned,
        }
    }
}

/// Check that `directory` may be used (and, when `clearing`, emptied).
///
/// Both paths are expected to be canonical.
pub(crate) fn check_directory_safety(
    directory: &Path,
    boundary: &Path,
    clearing: bool,
) -> Result<()> {
    let home = dirs::home_dir().map(|home| canonicalize_lossy(&home));
    check_directory_safety_with_home(directory, boundary, clearing, home.as_deref())
}

fn check_directory_safety_with_home(
    directory: &Path,
    boundary: &Path,
    clearing: bool,
    home: Option<&Path>,
) -> Result<()> {
    let unsafe_dir = |reason: String| Error::UnsafeDirectory {
        path: directory.to_path_buf(),
        reason,
    };

    if directory.parent().is_none() {
        return Err(unsafe_dir("it is the filesystem root".to_string()));
    }

    if !directory.starts_with(boundary) {
        return Err(unsafe_dir(format!(
            "it is outside the project boundary '{}'",
            boundary.display()
        )));
    }

    if clearing {
        if boundary.starts_with(directory) {
            return Err(unsafe_dir(
                "emptying it would delete the whole project".to_string(),
            ));
        }
        if directory.parent().is_some_and(|p| p.parent().is_none()) {
            return Err(unsafe_dir(
                "it is a top-level directory and will not be emptied".to_string(),
            ));
        }
        if let Some(home) = home {
            if home.starts_with(directory) {
                return Err(unsafe_dir(
                    "emptying it would delete the home directory".to_string(),
                ));
            }
        }
    }

    if directory.exists() && !directory.is_dir() {
        return Err(unsafe_dir("it exists and is not a directory".to_string()));
    }

    Ok(())
}

/// Remove every entry inside `dir` except the lock file.
///
/// Symlinks are removed, never followed.
pub(crate) fn clear_directory(dir: &Path) -> Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.file_name() == LOCK_FILE_NAME {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
        removed += 1;
    }

    Ok(removed)
}

/// Exclusive advisory lock on an output directory.
///
/// Released when dropped.
#[derive(Debug)]
pub(crate) struct DirLock {
    file: Option<File>,
    path: PathBuf,
}

impl DirLock {
    /// Lock `dir`, failing immediately if another pass holds it.
    pub(crate) fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        FileExt::try_lock_exclusive(&file).map_err(|e| Error::io(&path, e))?;

        Ok(Self {
            file: Some(file),
            path,
        })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        // Unlinking first means a competing pass never locks a file we are
        // about to delete. Windows refuses to unlink open files, so retry
        // after closing.
        let removed = fs::remove_file(&self.path).is_ok();

        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to release output lock");
            }
        }

        if !removed {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::debug!(path = %self.path.display(), error = %e, "lock file not removed");
            }
        }
    }
}
