use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// Root directory under which every request gets its own working directory.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh, uniquely named directory. Removed when the returned value is dropped.
    pub fn allocate(&self) -> std::io::Result<ScratchDir> {
        let dir = tempfile::Builder::new()
            .prefix("req-")
            .tempdir_in(&self.root)?;
        debug!("Allocated scratch directory {}", dir.path().display());
        Ok(ScratchDir { dir })
    }
}

#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
