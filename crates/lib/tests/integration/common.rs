//! Shared test helpers for invocation tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nodebuild_lib::event::{ObjectLocation, SourceProperties};
use nodebuild_lib::store::{LocalStore, upload_directory};
use nodebuild_lib::{InvocationRequest, StoreConfig, Worker, WorkerConfig};
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own object store root, scratch directory, and source tree.
pub struct TestEnv {
  pub temp: TempDir,
  pub store: Arc<LocalStore>,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::new(temp.path().join("objects")));
    Self { temp, store }
  }

  pub fn scratch_path(&self) -> PathBuf {
    self.temp.path().join("scratch")
  }

  pub fn worker(&self) -> Worker {
    let config = WorkerConfig {
      scratch_dir: self.scratch_path(),
      store: StoreConfig::Local(self.store.root().to_path_buf()),
      shell: None,
      log_stream_name: None,
    };
    Worker::new(self.store.clone(), config)
  }

  /// Write `files` into a fresh directory and publish it as `assets/<key>`.
  pub async fn put_source(&self, key: &str, files: &[(&str, &str)]) {
    let dir = self.temp.path().join("sources").join(key);
    write_tree(&dir, files);
    upload_directory(self.store.as_ref(), &dir, &ObjectLocation::new("assets", key))
      .await
      .unwrap();
  }

  pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
    self.store.object_path(&ObjectLocation::new(bucket, key)).unwrap()
  }

  /// Workspace directories still present under the scratch parent.
  pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
    match std::fs::read_dir(self.scratch_path()) {
      Ok(entries) => entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("extract"))
        .map(|e| e.path())
        .collect(),
      Err(_) => Vec::new(),
    }
  }
}

pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
  for (rel, content) in files {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
  }
}

pub fn source(key: &str, dir: &str, commands: Option<&[&str]>) -> SourceProperties {
  SourceProperties {
    source_bucket_name: "assets".to_string(),
    source_object_key: key.to_string(),
    directory_name: dir.to_string(),
    commands: commands.map(|c| c.iter().map(|s| s.to_string()).collect()),
  }
}

/// A Create event for `sources`, publishing to `artifacts/site.zip`.
pub fn create_event(url: &str, sources: Vec<SourceProperties>, output: &str) -> InvocationRequest {
  let json = serde_json::json!({
    "RequestType": "Create",
    "ResponseURL": url,
    "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/app/1234",
    "RequestId": "req-1",
    "LogicalResourceId": "SiteBuild",
    "ResourceType": "Custom::CDKNodejsBuild",
    "ResourceProperties": {
      "sources": sources,
      "destinationBucketName": "artifacts",
      "destinationObjectKey": "site.zip",
      "outputSourceDirectory": output,
    }
  });
  serde_json::from_value(json).unwrap()
}

/// Unpack a published zip into a map of relative path → contents.
pub fn read_zip(path: &Path) -> Vec<(String, Vec<u8>)> {
  use std::io::Read;

  let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
  let mut files = Vec::new();
  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).unwrap();
    if entry.is_dir() {
      continue;
    }
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    files.push((entry.name().to_string(), content));
  }
  files.sort();
  files
}
