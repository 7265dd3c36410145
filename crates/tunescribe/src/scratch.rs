//! Per-request scratch directories.
//!
//! Each request gets its own randomly named directory under the shared
//! scratch root, and every file in it carries a per-request token. The
//! directory and everything in it is removed when the [`ScratchDir`] drops,
//! whichever way the request ends.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

/// Hands out fresh [`ScratchDir`]s below a root directory.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new, empty directory owned by one request.
    pub async fn acquire(&self) -> Result<ScratchDir, ConvertError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(ConvertError::io(format!(
                "creating scratch root {}",
                self.root.display()
            )))?;

        let dir = tempfile::Builder::new()
            .prefix("req_")
            .tempdir_in(&self.root)
            .map_err(ConvertError::io(format!(
                "creating scratch directory in {}",
                self.root.display()
            )))?;

        let scratch = ScratchDir {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
            token: Uuid::new_v4().simple().to_string(),
        };
        debug!(path = %scratch.path.display(), "acquired scratch directory");
        Ok(scratch)
    }
}

/// A request's private directory. Deleted on drop; failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
    token: String,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unique token embedded in every file name.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Path for `<stem>_<token><ext>` inside this directory.
    pub fn file_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.path.join(format!("{stem}_{}{ext}", self.token))
    }

    /// Write `bytes` to a new file named by [`file_path`](Self::file_path).
    pub async fn write(&self, stem: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        let path = self.file_path(stem, ext);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(ConvertError::io(format!("writing {}", path.display())))?;
        Ok(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                debug!(path = %self.path.display(), error = %e, "scratch cleanup failed");
            }
        }
    }
}
