//! Archive object stores.
//!
//! Objects are addressed by bucket and key only. Two backends exist behind the
//! [`ArchiveStore`] trait: S3 for hosted runs, and a directory tree for tests and
//! offline runs.

pub mod local;
pub mod s3;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::actions::{ArchiveError, pack_directory};
use crate::config::StoreConfig;
use crate::event::ObjectLocation;

pub use local::LocalStore;
pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("object not found: {0}")]
  NotFound(ObjectLocation),

  #[error("transfer failed for {location}: {message}")]
  Transfer { location: ObjectLocation, message: String },

  #[error("invalid object location {location}: {reason}")]
  InvalidLocation { location: ObjectLocation, reason: String },

  #[error("failed to write '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to package directory: {0}")]
  Package(#[from] ArchiveError),
}

#[async_trait]
pub trait ArchiveStore: Send + Sync {
  /// Stream the object at `location` into the file at `dest`.
  ///
  /// Returns `dest` on success. A stream that fails part-way is an error, never a
  /// truncated file reported as success.
  async fn download(&self, location: &ObjectLocation, dest: &Path) -> Result<PathBuf, StoreError>;

  /// Write `body` as the object at `location`, replacing any existing object.
  async fn put_object(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<(), StoreError>;
}

/// Package `dir` into a zip archive and write it as one object at `location`.
pub async fn upload_directory(store: &dyn ArchiveStore, dir: &Path, location: &ObjectLocation) -> Result<(), StoreError> {
  let body = pack_directory(dir).await?;
  let size = body.len();
  store.put_object(location, body).await?;
  info!(dir = %dir.display(), destination = %location, size, "published archive");
  Ok(())
}

/// Open the store selected by `config`.
pub async fn open_store(config: &StoreConfig) -> Arc<dyn ArchiveStore> {
  match config {
    StoreConfig::S3 => Arc::new(S3Store::from_env().await),
    StoreConfig::Local(root) => Arc::new(LocalStore::new(root)),
  }
}
