//! Error and result types for build runs.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::task::JoinError;

use crate::actions::{ArchiveError, CommandError};
use crate::event::{ObjectLocation, PropertiesError};
use crate::protocol::TerminalStatus;
use crate::store::StoreError;
use crate::workspace::{Workspace, WorkspaceError};

/// Everything that can stop a build. The display string becomes the reported reason.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("invalid resource properties: {0}")]
  Properties(#[from] PropertiesError),

  #[error(transparent)]
  Workspace(#[from] WorkspaceError),

  #[error("failed to download {location}: {source}")]
  Download {
    location: ObjectLocation,
    #[source]
    source: StoreError,
  },

  #[error("failed to extract {location} into '{dir}': {source}")]
  Extract {
    location: ObjectLocation,
    dir: PathBuf,
    #[source]
    source: ArchiveError,
  },

  #[error("setup commands failed in '{dir}': {source}")]
  Setup {
    dir: PathBuf,
    #[source]
    source: CommandError,
  },

  #[error("working directory '{0}' does not exist")]
  MissingWorkingDirectory(PathBuf),

  #[error("build commands failed: {0}")]
  Build(#[source] CommandError),

  #[error("output directory '{0}' does not exist after the build")]
  MissingOutput(PathBuf),

  #[error("failed to publish {location}: {source}")]
  Publish {
    location: ObjectLocation,
    #[source]
    source: StoreError,
  },

  #[error("source task panicked: {0}")]
  Task(#[from] JoinError),
}

/// A finished run whose workspace has not been released yet.
///
/// Holding the workspace open lets the caller deliver the terminal status before
/// cleanup. Dropping a `Completed` still removes the workspace.
#[derive(Debug)]
pub struct Completed {
  pub status: TerminalStatus,
  pub(crate) workspace: Option<Workspace>,
}

impl Completed {
  /// Root of the workspace this run used, if it allocated one.
  pub fn workspace_root(&self) -> Option<&Path> {
    self.workspace.as_ref().map(Workspace::root)
  }

  /// Remove the workspace and hand back the status.
  pub fn finish(self) -> TerminalStatus {
    if let Some(workspace) = self.workspace {
      workspace.dispose();
    }
    self.status
  }
}
