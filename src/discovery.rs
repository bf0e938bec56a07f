//! Finds suite files on disk.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::LoadError;

/// Returns true for `.yml` and `.yaml` files.
pub fn is_suite_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
}

/// Lists suite files under `root`, sorted for a deterministic run order.
///
/// Only `root` itself is scanned unless `recursive` is set.
pub fn discover_suite_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, LoadError> {
    let mut walker = WalkDir::new(root).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| LoadError::Discovery {
            path: root.to_path_buf(),
            message: err.to_string(),
        })?;
        if entry.file_type().is_file() && is_suite_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
