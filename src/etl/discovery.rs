use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::EtlError;

pub const JSON_EXTENSION: &str = "json";

/// Every file under `root` with the given extension, as absolute paths.
///
/// Entries are visited in file-name order, so the result is stable for a
/// fixed tree. Dotfiles are skipped. File contents are not inspected.
pub fn discover_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, EtlError> {
    let root = std::fs::canonicalize(root).map_err(|e| EtlError::Discovery {
        root: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !root.is_dir() {
        return Err(EtlError::Discovery {
            reason: "not a directory".to_string(),
            root,
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| EtlError::Discovery {
            root: root.clone(),
            reason: e.to_string(),
        })?;

        // Symlinked files count as long as they point at a regular file
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file && has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }

    log::debug!("Discovered {} .{} files under {}", files.len(), extension, root.display());
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));

    !hidden && path.extension().and_then(|e| e.to_str()) == Some(extension)
}
