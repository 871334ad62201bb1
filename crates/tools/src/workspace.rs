//! Workspace confinement for file tools.
//!
//! Every path a tool touches is resolved against a single root directory.
//! Relative paths are joined onto the root; absolute paths must already lie
//! under it. `..` components are folded lexically and may never climb above
//! the root, so the check also holds for files that don't exist yet.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path cannot be confined to the workspace.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' escapes the workspace root")]
    PathTraversal { path: String },

    #[error("Path '{path}' is outside the workspace root {root}")]
    OutsideWorkspace { path: String, root: String },

    #[error("Path must not be empty")]
    Empty,
}

/// The directory tools are confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`.
    ///
    /// The root is canonicalized when it exists so that absolute paths
    /// handed back by the OS compare equal to it.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .or_else(|_| std::path::absolute(root))
            .unwrap_or_else(|_| root.to_path_buf());
        Self {
            root: normalize(&root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path to an absolute path inside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PathValidationError::Empty);
        }

        let input = Path::new(trimmed);
        if input.is_absolute() {
            let normalized = normalize(input);
            if normalized.starts_with(&self.root) {
                return Ok(normalized);
            }
            return Err(PathValidationError::OutsideWorkspace {
                path: path.into(),
                root: self.root.display().to_string(),
            });
        }

        let mut resolved = self.root.clone();
        let depth_floor = self.root.components().count();
        for component in input.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if resolved.components().count() <= depth_floor {
                        return Err(PathValidationError::PathTraversal { path: path.into() });
                    }
                    resolved.pop();
                }
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathValidationError::PathTraversal { path: path.into() });
                }
            }
        }
        Ok(resolved)
    }

    /// Render an absolute path relative to the root, for tool output.
    pub fn display(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            ".".into()
        } else {
            relative.to_string_lossy().replace('\\', "/")
        }
    }
}

/// Fold `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_onto_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let resolved = ws.resolve("src/main.rs").unwrap();
        assert!(resolved.starts_with(ws.root()));
        assert!(resolved.ends_with("src/main.rs"));
    }

    #[test]
    fn current_dir_marker_is_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert_eq!(ws.resolve(".").unwrap(), ws.root());
        assert_eq!(ws.display(ws.root()), ".");
    }

    #[test]
    fn inner_parent_components_are_folded() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let resolved = ws.resolve("a/b/../c.txt").unwrap();
        assert_eq!(ws.display(&resolved), "a/c.txt");
    }

    #[test]
    fn traversal_above_root_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let err = ws.resolve("../../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::PathTraversal { .. }));
    }

    #[test]
    fn absolute_outside_root_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let err = ws.resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));
    }

    #[test]
    fn absolute_inside_root_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let inside = ws.root().join("notes.md");
        assert_eq!(ws.resolve(inside.to_str().unwrap()).unwrap(), inside);
    }

    #[test]
    fn empty_path_rejected() {
        let ws = Workspace::new(".");
        assert!(matches!(ws.resolve("  "), Err(PathValidationError::Empty)));
    }
}
