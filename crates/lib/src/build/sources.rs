//! Concurrent source materialization.
//!
//! Each source runs download → extract → setup as its own task. Every task is
//! driven to completion before this phase returns, even after a sibling fails:
//! extraction runs on blocking threads and setup commands in child processes,
//! neither of which stops when its task is aborted, and the workspace must not
//! be removed while they are still writing into it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::types::BuildError;
use crate::actions::{extract, run_commands};
use crate::consts::FETCH_DIR;
use crate::event::SourceArchive;
use crate::store::ArchiveStore;
use crate::workspace::Workspace;

/// Everything one source task needs, owned so the task can be spawned.
struct SourceJob {
  index: usize,
  source: SourceArchive,
  archive: PathBuf,
  target: PathBuf,
  store: Arc<dyn ArchiveStore>,
  env: Arc<BTreeMap<String, String>>,
  shell: Option<String>,
}

/// Fetch, unpack, and prepare every source, in parallel.
///
/// Returns the first failure (in completion order) once all tasks have finished.
pub(crate) async fn materialize_sources(
  sources: &[SourceArchive],
  workspace: &Workspace,
  store: Arc<dyn ArchiveStore>,
  env: Arc<BTreeMap<String, String>>,
  shell: Option<&str>,
) -> Result<(), BuildError> {
  info!(count = sources.len(), "materializing sources");

  let mut join_set = JoinSet::new();
  for (index, source) in sources.iter().enumerate() {
    let job = SourceJob {
      index,
      source: source.clone(),
      archive: workspace.archive_path(index),
      target: workspace.resolve(&source.directory),
      store: store.clone(),
      env: env.clone(),
      shell: shell.map(str::to_string),
    };
    join_set.spawn(job.run());
  }

  let mut first_error = None;
  while let Some(joined) = join_set.join_next().await {
    let result = joined.map_err(BuildError::from).and_then(|r| r);
    if let Err(e) = result {
      error!(error = %e, "source failed");
      first_error.get_or_insert(e);
    }
  }

  if let Some(e) = first_error {
    return Err(e);
  }

  // Archives are gone by now; drop their directory so it never ends up in the output.
  let fetch_dir = workspace.root().join(FETCH_DIR);
  if let Err(e) = tokio::fs::remove_dir_all(&fetch_dir).await {
    debug!(path = %fetch_dir.display(), error = %e, "could not remove fetch directory");
  }

  Ok(())
}

impl SourceJob {
  async fn run(self) -> Result<(), BuildError> {
    let location = &self.source.location;
    let dir = display_dir(&self.source.directory);
    info!(index = self.index, source = %location, dir = %dir.display(), "fetching source");

    self
      .store
      .download(location, &self.archive)
      .await
      .map_err(|source| BuildError::Download {
        location: location.clone(),
        source,
      })?;

    extract(&self.archive, &self.target)
      .await
      .map_err(|source| BuildError::Extract {
        location: location.clone(),
        dir: dir.clone(),
        source,
      })?;

    if let Err(e) = tokio::fs::remove_file(&self.archive).await {
      debug!(path = %self.archive.display(), error = %e, "could not remove downloaded archive");
    }
    info!(index = self.index, dir = %dir.display(), "extracted source");

    if !self.source.setup_commands.is_empty() {
      run_commands(&self.source.setup_commands, &self.target, &self.env, self.shell.as_deref())
        .await
        .map_err(|source| BuildError::Setup { dir, source })?;
    }

    Ok(())
  }
}

/// Workspace-relative directory as shown in messages; the root shows as `.`.
pub(crate) fn display_dir(relative: &Path) -> PathBuf {
  if relative.as_os_str().is_empty() {
    PathBuf::from(".")
  } else {
    relative.to_path_buf()
  }
}
