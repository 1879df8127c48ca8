//! S3-backed archive store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{ArchiveStore, StoreError};
use crate::event::ObjectLocation;

#[derive(Debug, Clone)]
pub struct S3Store {
  client: S3Client,
}

impl S3Store {
  /// Build a client from the standard AWS environment chain (region, credentials, endpoint).
  pub async fn from_env() -> Self {
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    Self::new(S3Client::new(&config))
  }

  pub fn new(client: S3Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ArchiveStore for S3Store {
  async fn download(&self, location: &ObjectLocation, dest: &Path) -> Result<PathBuf, StoreError> {
    info!(bucket = %location.bucket, key = %location.key, "downloading object");

    let response = self
      .client
      .get_object()
      .bucket(&location.bucket)
      .key(&location.key)
      .send()
      .await
      .map_err(|e| {
        if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
          StoreError::NotFound(location.clone())
        } else {
          StoreError::Transfer {
            location: location.clone(),
            message: DisplayErrorContext(&e).to_string(),
          }
        }
      })?;

    let io_err = |source| StoreError::Io {
      path: dest.to_path_buf(),
      source,
    };

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut file = fs::File::create(dest).await.map_err(io_err)?;
    let mut body = response.body.into_async_read();
    let size = tokio::io::copy(&mut body, &mut file)
      .await
      .map_err(|e| StoreError::Transfer {
        location: location.clone(),
        message: e.to_string(),
      })?;
    file.flush().await.map_err(io_err)?;

    debug!(path = %dest.display(), size, "download complete");
    Ok(dest.to_path_buf())
  }

  async fn put_object(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<(), StoreError> {
    let size = body.len();
    info!(bucket = %location.bucket, key = %location.key, size, "uploading object");

    self
      .client
      .put_object()
      .bucket(&location.bucket)
      .key(&location.key)
      .body(ByteStream::from(body))
      .send()
      .await
      .map_err(|e| StoreError::Transfer {
        location: location.clone(),
        message: DisplayErrorContext(&e).to_string(),
      })?;

    Ok(())
  }
}
