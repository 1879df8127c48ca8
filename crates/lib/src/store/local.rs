//! Filesystem-backed archive store.
//!
//! Objects live at `<root>/<bucket>/<key>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ArchiveStore, StoreError};
use crate::event::{ObjectLocation, normalize_relative};

#[derive(Debug, Clone)]
pub struct LocalStore {
  root: PathBuf,
}

impl LocalStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Path of the object at `location`. Buckets and keys may not climb out of the root.
  pub fn object_path(&self, location: &ObjectLocation) -> Result<PathBuf, StoreError> {
    let invalid = |e: crate::event::PropertiesError| StoreError::InvalidLocation {
      location: location.clone(),
      reason: e.to_string(),
    };

    let bucket = normalize_relative("bucket", &location.bucket).map_err(invalid)?;
    let key = normalize_relative("key", &location.key).map_err(invalid)?;
    if bucket.as_os_str().is_empty() || key.as_os_str().is_empty() {
      return Err(StoreError::InvalidLocation {
        location: location.clone(),
        reason: "bucket and key must name something".to_string(),
      });
    }

    Ok(self.root.join(bucket).join(key))
  }
}

#[async_trait]
impl ArchiveStore for LocalStore {
  async fn download(&self, location: &ObjectLocation, dest: &Path) -> Result<PathBuf, StoreError> {
    let source = self.object_path(location)?;
    debug!(source = %source.display(), dest = %dest.display(), "copying object");

    let mut reader = match fs::File::open(&source).await {
      Ok(file) => file,
      Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(location.clone())),
      Err(source) => {
        return Err(StoreError::Transfer {
          location: location.clone(),
          message: source.to_string(),
        });
      }
    };

    let io_err = |source| StoreError::Io {
      path: dest.to_path_buf(),
      source,
    };

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut writer = fs::File::create(dest).await.map_err(io_err)?;
    tokio::io::copy(&mut reader, &mut writer)
      .await
      .map_err(|e| StoreError::Transfer {
        location: location.clone(),
        message: e.to_string(),
      })?;
    writer.flush().await.map_err(io_err)?;

    Ok(dest.to_path_buf())
  }

  async fn put_object(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<(), StoreError> {
    let path = self.object_path(location)?;
    let io_err = |source| StoreError::Io {
      path: path.clone(),
      source,
    };

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    // Write beside the target and rename so readers never see a partial object.
    let mut partial = path.clone().into_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    fs::write(&partial, &body).await.map_err(io_err)?;
    fs::rename(&partial, &path).await.map_err(io_err)?;

    debug!(path = %path.display(), size = body.len(), "stored object");
    Ok(())
  }
}
