//! Per-invocation scratch workspaces.
//!
//! A [`Workspace`] owns a uniquely named directory under the scratch parent. The
//! directory is removed by [`Workspace::close`] on the normal path, and by the
//! underlying [`TempDir`] guard if the workspace is dropped without closing.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{FETCH_DIR, WORKSPACE_PREFIX};

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("failed to create workspace under '{path}': {source}")]
  Create {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove workspace '{path}': {source}")]
  Cleanup {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug)]
pub struct Workspace {
  dir: TempDir,
}

impl Workspace {
  /// Allocate a fresh workspace under `scratch_dir`, creating the parent if needed.
  pub fn create(scratch_dir: &Path) -> Result<Self, WorkspaceError> {
    let create_err = |source| WorkspaceError::Create {
      path: scratch_dir.to_path_buf(),
      source,
    };

    std::fs::create_dir_all(scratch_dir).map_err(create_err)?;
    let dir = tempfile::Builder::new()
      .prefix(WORKSPACE_PREFIX)
      .tempdir_in(scratch_dir)
      .map_err(create_err)?;

    debug!(path = %dir.path().display(), "workspace created");
    Ok(Self { dir })
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  /// Resolve a normalized workspace-relative path.
  pub fn resolve(&self, relative: &Path) -> PathBuf {
    self.root().join(relative)
  }

  /// Where the archive for the source at `index` is downloaded before unpacking.
  pub fn archive_path(&self, index: usize) -> PathBuf {
    self.root().join(FETCH_DIR).join(format!("source-{index}.archive"))
  }

  /// Remove the workspace and everything in it.
  pub fn close(self) -> Result<(), WorkspaceError> {
    let path = self.root().to_path_buf();
    self
      .dir
      .close()
      .map_err(|source| WorkspaceError::Cleanup { path: path.clone(), source })?;
    debug!(path = %path.display(), "workspace removed");
    Ok(())
  }

  /// Remove the workspace, logging instead of failing. Cleanup is best-effort.
  pub fn dispose(self) {
    if let Err(e) = self.close() {
      warn!(error = %e, "workspace cleanup failed");
    }
  }
}
