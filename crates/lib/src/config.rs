//! Worker configuration resolved from the process environment.

use std::path::PathBuf;

use crate::consts::{ENV_LOCAL_STORE, ENV_LOG_STREAM, ENV_SCRATCH_DIR, ENV_SHELL};

/// Which archive store backend an invocation talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
  /// S3, configured through the standard AWS environment chain.
  S3,
  /// Filesystem store rooted at the given directory.
  Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
  /// Parent directory of every workspace and of the npm user config/cache.
  pub scratch_dir: PathBuf,

  pub store: StoreConfig,

  /// Shell used for setup and build commands. `None` means `/bin/sh`.
  pub shell: Option<String>,

  /// Name of the log stream the hosting runtime writes to, if any.
  /// Only used to point the default success reason at the right place.
  pub log_stream_name: Option<String>,
}

impl WorkerConfig {
  /// Resolve the configuration from environment variables.
  ///
  /// - `NODEBUILD_SCRATCH_DIR`: scratch parent (default: the system temp dir)
  /// - `NODEBUILD_LOCAL_STORE`: use the filesystem store rooted here instead of S3
  /// - `NODEBUILD_SHELL`: shell override for commands
  /// - `AWS_LAMBDA_LOG_STREAM_NAME`: log stream named in the default reason
  pub fn from_env() -> Self {
    let scratch_dir = non_empty_var(ENV_SCRATCH_DIR)
      .map(PathBuf::from)
      .unwrap_or_else(std::env::temp_dir);

    let store = match non_empty_var(ENV_LOCAL_STORE) {
      Some(root) => StoreConfig::Local(PathBuf::from(root)),
      None => StoreConfig::S3,
    };

    Self {
      scratch_dir,
      store,
      shell: non_empty_var(ENV_SHELL),
      log_stream_name: non_empty_var(ENV_LOG_STREAM),
    }
  }
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      scratch_dir: std::env::temp_dir(),
      store: StoreConfig::S3,
      shell: None,
      log_stream_name: None,
    }
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}
