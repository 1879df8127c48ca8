//! Invocation events and build properties.
//!
//! The event is the JSON document a lifecycle orchestrator hands to the worker.
//! Its `ResourceProperties` are parsed leniently (missing fields default) so that
//! a malformed property set still reaches the callback as a failure instead of
//! being dropped before the response address is known. [`BuildProperties`] is the
//! validated form the build actually runs from.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{DEFAULT_BUILD_COMMAND, FETCH_DIR};

/// The desired end-state carried by an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
  Create,
  Update,
  Delete,
}

impl RequestKind {
  /// Whether this kind of request runs a build.
  pub fn builds(self) -> bool {
    matches!(self, RequestKind::Create | RequestKind::Update)
  }
}

impl fmt::Display for RequestKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RequestKind::Create => "Create",
      RequestKind::Update => "Update",
      RequestKind::Delete => "Delete",
    };
    f.write_str(name)
  }
}

/// Identifiers the caller expects echoed back in the terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Correlation {
  pub stack_id: String,
  pub request_id: String,
  pub logical_resource_id: String,
}

/// A single lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationRequest {
  pub request_type: RequestKind,

  /// Address that must receive exactly one terminal status.
  #[serde(rename = "ResponseURL")]
  pub response_url: String,

  #[serde(flatten)]
  pub correlation: Correlation,

  /// Present on Update and Delete events.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub physical_resource_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_type: Option<String>,

  #[serde(default)]
  pub resource_properties: ResourceProperties,
}

impl InvocationRequest {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

/// Resource properties as they appear on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProperties {
  #[serde(default)]
  pub sources: Vec<SourceProperties>,

  #[serde(default)]
  pub destination_bucket_name: String,

  #[serde(default)]
  pub destination_object_key: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub working_directory: Option<String>,

  /// Relative to the workspace root, not to `working_directory`.
  #[serde(default)]
  pub output_source_directory: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub environment: Option<BTreeMap<String, String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_commands: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceProperties {
  #[serde(default)]
  pub source_bucket_name: String,

  #[serde(default)]
  pub source_object_key: String,

  #[serde(default)]
  pub directory_name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub commands: Option<Vec<String>>,
}

/// A bucket/key pair addressing one object in the archive store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
  pub bucket: String,
  pub key: String,
}

impl ObjectLocation {
  pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
    Self {
      bucket: bucket.into(),
      key: key.into(),
    }
  }
}

impl fmt::Display for ObjectLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.bucket, self.key)
  }
}

/// A declared archive to fetch, unpack, and prepare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArchive {
  pub location: ObjectLocation,

  /// Extraction directory, relative to the workspace root and normalized.
  pub directory: PathBuf,

  /// Run in `directory` after extraction. May be empty.
  pub setup_commands: Vec<String>,
}

/// Validated build properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProperties {
  pub sources: Vec<SourceArchive>,
  pub destination: ObjectLocation,
  pub working_directory: PathBuf,
  pub output_directory: PathBuf,
  pub environment: BTreeMap<String, String>,
  pub build_commands: Vec<String>,
}

/// Reasons a property set is rejected before any work starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertiesError {
  #[error("at least one source is required")]
  NoSources,

  #[error("{field} must not be empty")]
  EmptyField { field: String },

  #[error("at least one build command is required")]
  NoBuildCommands,

  #[error("invalid {field} '{path}': {reason}")]
  InvalidPath {
    field: String,
    path: String,
    reason: &'static str,
  },

  #[error("directory '{0}' is declared by more than one source")]
  DuplicateDirectory(String),
}

impl TryFrom<&ResourceProperties> for BuildProperties {
  type Error = PropertiesError;

  fn try_from(props: &ResourceProperties) -> Result<Self, Self::Error> {
    if props.sources.is_empty() {
      return Err(PropertiesError::NoSources);
    }

    let mut sources = Vec::with_capacity(props.sources.len());
    let mut seen = HashSet::new();

    for (index, source) in props.sources.iter().enumerate() {
      let location = ObjectLocation::new(
        require(&format!("sources[{index}].sourceBucketName"), &source.source_bucket_name)?,
        require(&format!("sources[{index}].sourceObjectKey"), &source.source_object_key)?,
      );

      let field = format!("sources[{index}].directoryName");
      let directory = normalize_relative(&field, &source.directory_name)?;
      if directory.starts_with(FETCH_DIR) {
        return Err(PropertiesError::InvalidPath {
          field,
          path: source.directory_name.clone(),
          reason: "name is reserved by the worker",
        });
      }
      if !seen.insert(directory.clone()) {
        return Err(PropertiesError::DuplicateDirectory(source.directory_name.clone()));
      }

      sources.push(SourceArchive {
        location,
        directory,
        setup_commands: source.commands.clone().unwrap_or_default(),
      });
    }

    let destination = ObjectLocation::new(
      require("destinationBucketName", &props.destination_bucket_name)?,
      require("destinationObjectKey", &props.destination_object_key)?,
    );

    // The first source doubles as the working directory when none is named.
    let working_directory = match &props.working_directory {
      Some(dir) => normalize_relative("workingDirectory", dir)?,
      None => sources[0].directory.clone(),
    };

    // Absent means misconfigured; `.` names the workspace root explicitly.
    let output_source_directory = require("outputSourceDirectory", &props.output_source_directory)?;
    let output_directory = normalize_relative("outputSourceDirectory", &output_source_directory)?;

    let build_commands = match &props.build_commands {
      Some(commands) if commands.is_empty() => return Err(PropertiesError::NoBuildCommands),
      Some(commands) => commands.clone(),
      None => vec![DEFAULT_BUILD_COMMAND.to_string()],
    };

    Ok(BuildProperties {
      sources,
      destination,
      working_directory,
      output_directory,
      environment: props.environment.clone().unwrap_or_default(),
      build_commands,
    })
  }
}

fn require(field: &str, value: &str) -> Result<String, PropertiesError> {
  if value.is_empty() {
    return Err(PropertiesError::EmptyField {
      field: field.to_string(),
    });
  }
  Ok(value.to_string())
}

/// Lexically normalize a workspace-relative path.
///
/// `.` components are dropped and `..` pops the previous component. Absolute paths
/// and paths that climb above the root are rejected. An empty result names the
/// workspace root itself.
pub fn normalize_relative(field: &str, raw: &str) -> Result<PathBuf, PropertiesError> {
  let invalid = |reason| PropertiesError::InvalidPath {
    field: field.to_string(),
    path: raw.to_string(),
    reason,
  };

  let mut normalized = PathBuf::new();
  for component in Path::new(raw).components() {
    match component {
      Component::Normal(part) => normalized.push(part),
      Component::CurDir => {}
      Component::ParentDir => {
        if !normalized.pop() {
          return Err(invalid("escapes the workspace"));
        }
      }
      Component::RootDir | Component::Prefix(_) => return Err(invalid("must be relative")),
    }
  }

  Ok(normalized)
}

#[cfg(test)]
mod tests {
  use super::*;

  const CREATE_EVENT: &str = r#"{
    "RequestType": "Create",
    "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:handler",
    "ResponseURL": "https://callback.example.com/response?sig=abc",
    "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/app/1234",
    "RequestId": "req-1",
    "LogicalResourceId": "FrontendBuild",
    "ResourceType": "Custom::CDKNodejsBuild",
    "ResourceProperties": {
      "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:handler",
      "sources": [
        {
          "sourceBucketName": "assets",
          "sourceObjectKey": "frontend.zip",
          "directoryName": "frontend",
          "commands": ["npm ci"]
        },
        {
          "sourceBucketName": "assets",
          "sourceObjectKey": "shared.zip",
          "directoryName": "shared"
        }
      ],
      "destinationBucketName": "artifacts",
      "destinationObjectKey": "abc123.zip",
      "workingDirectory": "frontend",
      "outputSourceDirectory": "frontend/dist",
      "environment": { "VITE_API_URL": "https://api.example.com" },
      "buildCommands": ["npm run build"]
    }
  }"#;

  fn props_with_sources(dirs: &[&str]) -> ResourceProperties {
    ResourceProperties {
      sources: dirs
        .iter()
        .map(|d| SourceProperties {
          source_bucket_name: "assets".to_string(),
          source_object_key: format!("{d}.zip"),
          directory_name: d.to_string(),
          commands: None,
        })
        .collect(),
      destination_bucket_name: "artifacts".to_string(),
      destination_object_key: "out.zip".to_string(),
      working_directory: None,
      output_source_directory: "dist".to_string(),
      environment: None,
      build_commands: None,
    }
  }

  #[test]
  fn parses_create_event() {
    let request = InvocationRequest::from_json(CREATE_EVENT).unwrap();

    assert_eq!(request.request_type, RequestKind::Create);
    assert_eq!(request.response_url, "https://callback.example.com/response?sig=abc");
    assert_eq!(request.correlation.logical_resource_id, "FrontendBuild");
    assert_eq!(request.correlation.request_id, "req-1");
    assert!(request.physical_resource_id.is_none());
    assert_eq!(request.resource_type.as_deref(), Some("Custom::CDKNodejsBuild"));
    assert_eq!(request.resource_properties.sources.len(), 2);
  }

  #[test]
  fn converts_wire_properties() {
    let request = InvocationRequest::from_json(CREATE_EVENT).unwrap();
    let props = BuildProperties::try_from(&request.resource_properties).unwrap();

    assert_eq!(props.sources[0].location, ObjectLocation::new("assets", "frontend.zip"));
    assert_eq!(props.sources[0].setup_commands, vec!["npm ci"]);
    assert!(props.sources[1].setup_commands.is_empty());
    assert_eq!(props.destination.to_string(), "artifacts/abc123.zip");
    assert_eq!(props.working_directory, PathBuf::from("frontend"));
    assert_eq!(props.output_directory, PathBuf::from("frontend/dist"));
    assert_eq!(props.environment["VITE_API_URL"], "https://api.example.com");
  }

  #[test]
  fn delete_event_without_properties_parses() {
    let json = r#"{
      "RequestType": "Delete",
      "ResponseURL": "http://localhost/cb",
      "StackId": "stack",
      "RequestId": "req-2",
      "LogicalResourceId": "Build",
      "PhysicalResourceId": "Build-0123456789abcdef"
    }"#;

    let request = InvocationRequest::from_json(json).unwrap();
    assert_eq!(request.request_type, RequestKind::Delete);
    assert!(!request.request_type.builds());
    assert_eq!(request.physical_resource_id.as_deref(), Some("Build-0123456789abcdef"));
    assert!(request.resource_properties.sources.is_empty());
  }

  #[test]
  fn unknown_request_type_is_rejected() {
    let json = r#"{"RequestType": "Replace", "ResponseURL": "x", "StackId": "s", "RequestId": "r", "LogicalResourceId": "l"}"#;
    assert!(InvocationRequest::from_json(json).is_err());
  }

  #[test]
  fn empty_sources_fail_validation() {
    let props = props_with_sources(&[]);
    assert_eq!(BuildProperties::try_from(&props), Err(PropertiesError::NoSources));
  }

  #[test]
  fn defaults_are_applied() {
    let props = BuildProperties::try_from(&props_with_sources(&["app", "lib"])).unwrap();

    assert_eq!(props.build_commands, vec![DEFAULT_BUILD_COMMAND]);
    assert_eq!(props.working_directory, PathBuf::from("app"));
    assert!(props.environment.is_empty());
  }

  #[test]
  fn explicit_empty_build_commands_are_rejected() {
    let mut props = props_with_sources(&["app"]);
    props.build_commands = Some(Vec::new());
    assert_eq!(BuildProperties::try_from(&props), Err(PropertiesError::NoBuildCommands));
  }

  #[test]
  fn duplicate_directories_are_rejected() {
    let props = props_with_sources(&["app", "./app"]);
    assert_eq!(
      BuildProperties::try_from(&props),
      Err(PropertiesError::DuplicateDirectory("./app".to_string()))
    );
  }

  #[test]
  fn missing_destination_is_rejected() {
    let mut props = props_with_sources(&["app"]);
    props.destination_bucket_name.clear();
    let err = BuildProperties::try_from(&props).unwrap_err();
    assert_eq!(err.to_string(), "destinationBucketName must not be empty");
  }

  #[test]
  fn missing_output_directory_is_rejected() {
    let json = r#"{
      "sources": [{ "sourceBucketName": "assets", "sourceObjectKey": "app.zip", "directoryName": "app" }],
      "destinationBucketName": "artifacts",
      "destinationObjectKey": "out.zip"
    }"#;
    let props: ResourceProperties = serde_json::from_str(json).unwrap();

    assert_eq!(
      BuildProperties::try_from(&props),
      Err(PropertiesError::EmptyField {
        field: "outputSourceDirectory".to_string()
      })
    );
  }

  #[test]
  fn dot_output_directory_is_workspace_root() {
    let mut props = props_with_sources(&["app"]);
    props.output_source_directory = ".".to_string();
    let built = BuildProperties::try_from(&props).unwrap();
    assert_eq!(built.output_directory, PathBuf::new());
  }

  #[test]
  fn escaping_paths_are_rejected() {
    let mut props = props_with_sources(&["app"]);
    props.output_source_directory = "../outside".to_string();
    assert!(matches!(
      BuildProperties::try_from(&props),
      Err(PropertiesError::InvalidPath { reason: "escapes the workspace", .. })
    ));
  }

  #[test]
  fn reserved_directory_is_rejected() {
    let props = props_with_sources(&[FETCH_DIR]);
    assert!(matches!(
      BuildProperties::try_from(&props),
      Err(PropertiesError::InvalidPath { .. })
    ));
  }

  #[test]
  fn normalize_relative_paths() {
    assert_eq!(normalize_relative("f", "a/./b").unwrap(), PathBuf::from("a/b"));
    assert_eq!(normalize_relative("f", "a/../b").unwrap(), PathBuf::from("b"));
    assert_eq!(normalize_relative("f", ".").unwrap(), PathBuf::new());
    assert_eq!(normalize_relative("f", "").unwrap(), PathBuf::new());
    assert!(normalize_relative("f", "/etc").is_err());
    assert!(normalize_relative("f", "a/../../b").is_err());
  }
}
