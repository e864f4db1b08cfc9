//! Asset path expansion and collapse.
//!
//! Asset records store file paths relative to their module directory so a
//! module can move on disk. Live assets hold absolute paths.

use std::path::{Component, Path, PathBuf};

/// Lexically normalises a path: drops `.` and resolves `..` against
/// preceding normal components. Does not touch the filesystem.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push(component.as_os_str());
                }
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Expands `path` against `root`. Absolute paths pass through unchanged.
#[must_use]
pub fn expand_asset_path(root: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return path.to_path_buf();
    }
    normalize_path(&root.join(path))
}

/// Collapses `path` to a `/`-separated path relative to `root`. Paths
/// outside the root, and paths already relative, are returned unchanged.
#[must_use]
pub fn collapse_asset_path(root: &Path, path: &Path) -> PathBuf {
    if !path.is_absolute() {
        return path.to_path_buf();
    }
    let root = normalize_path(root);
    match normalize_path(path).strip_prefix(&root) {
        Ok(relative) => {
            let joined = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            PathBuf::from(joined)
        },
        Err(_) => path.to_path_buf(),
    }
}
