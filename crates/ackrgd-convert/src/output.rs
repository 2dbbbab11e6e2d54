//! Output layout and write-path safety
//!
//! Every file lands under `<out>/ack/`. Paths are checked twice: lexically
//! before any directory is created, then again after canonicalizing the
//! parent so symlinks cannot redirect a write outside the output directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{ConvertError, Result};

/// Sub-directory holding the generated graphs
pub const GRAPH_DIR: &str = "ack";

/// Output directory with write-path checks
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Canonicalized output directory
    root: PathBuf,
}

impl OutputLayout {
    /// Create the output directory if needed and canonicalize it
    pub fn new(out_dir: impl AsRef<Path>) -> Result<Self> {
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir)?;
        let root = out_dir.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<out>/ack/<service>-crds.yaml`
    pub fn crd_graph_path(&self, service: &str) -> PathBuf {
        self.graph_path(&format!("{}-crds.yaml", service))
    }

    /// `<out>/ack/<service>-ctrl.yaml`
    pub fn controller_graph_path(&self, service: &str) -> PathBuf {
        self.graph_path(&format!("{}-ctrl.yaml", service))
    }

    /// `<out>/ack/<service>-defaults.yaml`
    pub fn defaults_path(&self, service: &str) -> PathBuf {
        self.graph_path(&format!("{}-defaults.yaml", service))
    }

    fn graph_path(&self, file_name: &str) -> PathBuf {
        self.root.join(GRAPH_DIR).join(file_name)
    }

    /// Verify `path` resolves strictly inside the output directory
    ///
    /// Creates the parent directory, since canonicalization needs it to
    /// exist. Returns the checked path.
    pub fn check(&self, path: &Path) -> Result<PathBuf> {
        let escape = || ConvertError::PathEscape {
            path: path.to_path_buf(),
            out_dir: self.root.clone(),
        };

        let candidate = lexical_normalize(&self.root.join(path));
        if candidate == self.root || !candidate.starts_with(&self.root) {
            return Err(escape());
        }
        let (Some(parent), Some(file_name)) = (candidate.parent(), candidate.file_name()) else {
            return Err(escape());
        };

        fs::create_dir_all(parent)?;
        let resolved = parent.canonicalize()?.join(file_name);
        if !resolved.starts_with(&self.root) {
            return Err(escape());
        }
        Ok(resolved)
    }

    /// Write `content` to `path` after the containment check
    pub fn write(&self, path: &Path, content: &str) -> Result<PathBuf> {
        let target = self.check(path)?;
        fs::write(&target, content)?;
        debug!(path = %target.display(), bytes = content.len(), "wrote file");
        Ok(target)
    }
}

/// Resolve `.` and `..` components without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
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
    use tempfile::TempDir;

    #[test]
    fn test_paths_under_ack_dir() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path()).unwrap();
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(layout.crd_graph_path("s3"), root.join("ack/s3-crds.yaml"));
        assert_eq!(layout.controller_graph_path("s3"), root.join("ack/s3-ctrl.yaml"));
        assert_eq!(layout.defaults_path("s3"), root.join("ack/s3-defaults.yaml"));
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("out")).unwrap();

        let written = layout
            .write(&layout.crd_graph_path("s3"), "kind: ResourceGraphDefinition\n")
            .unwrap();
        assert!(written.ends_with("ack/s3-crds.yaml"));
        assert_eq!(
            fs::read_to_string(written).unwrap(),
            "kind: ResourceGraphDefinition\n"
        );
    }

    #[test]
    fn test_traversal_in_service_name_rejected() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("out")).unwrap();

        let path = layout.crd_graph_path("../../evil");
        let err = layout.write(&path, "x").unwrap_err();
        assert!(matches!(err, ConvertError::PathEscape { .. }));
        assert!(!dir.path().join("evil-crds.yaml").exists());
    }

    #[test]
    fn test_absolute_path_outside_rejected() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path()).unwrap();

        let err = layout.check(&other.path().join("x.yaml")).unwrap_err();
        assert!(matches!(err, ConvertError::PathEscape { .. }));
        assert!(layout.check(layout.root()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_parent_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), layout.root().join(GRAPH_DIR)).unwrap();

        let err = layout.write(&layout.crd_graph_path("s3"), "x").unwrap_err();
        assert!(matches!(err, ConvertError::PathEscape { .. }));
        assert!(!outside.path().join("s3-crds.yaml").exists());
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
    }
}
