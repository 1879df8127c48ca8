//! Build orchestration.
//!
//! A build run goes:
//! 1. Validate the resource properties
//! 2. Allocate a workspace
//! 3. Fetch, unpack, and prepare every source concurrently, then wait for all of them
//! 4. Run the build commands in the working directory
//! 5. Package the output directory and publish it
//!
//! Delete requests skip all of it. Whatever happens, the run ends in a
//! [`TerminalStatus`]; errors never escape [`BuildRunner::run`].

mod sources;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::actions::run_commands;
use crate::config::WorkerConfig;
use crate::event::{BuildProperties, InvocationRequest};
use crate::protocol::{TerminalStatus, default_reason};
use crate::store::{ArchiveStore, upload_directory};
use crate::workspace::Workspace;

use sources::{display_dir, materialize_sources};

pub use types::{BuildError, Completed};

pub struct BuildRunner {
  store: Arc<dyn ArchiveStore>,
  config: WorkerConfig,
}

impl BuildRunner {
  pub fn new(store: Arc<dyn ArchiveStore>, config: WorkerConfig) -> Self {
    Self { store, config }
  }

  /// Run the request to a terminal status and remove its workspace.
  pub async fn run(&self, request: &InvocationRequest) -> TerminalStatus {
    self.execute(request).await.finish()
  }

  /// Run the request to a terminal status, leaving the workspace for the caller to release.
  pub async fn execute(&self, request: &InvocationRequest) -> Completed {
    if !request.request_type.builds() {
      // The published object belongs to the deployment step; nothing to tear down here.
      info!(kind = %request.request_type, "no build action for request");
      return Completed {
        status: self.success(request),
        workspace: None,
      };
    }

    let props = match BuildProperties::try_from(&request.resource_properties) {
      Ok(props) => props,
      Err(e) => {
        let e = BuildError::from(e);
        error!(error = %e, "rejected resource properties");
        return Completed {
          status: TerminalStatus::failed(request, e.to_string()),
          workspace: None,
        };
      }
    };

    let workspace = match Workspace::create(&self.config.scratch_dir) {
      Ok(workspace) => workspace,
      Err(e) => {
        error!(error = %e, "could not allocate workspace");
        return Completed {
          status: TerminalStatus::failed(request, e.to_string()),
          workspace: None,
        };
      }
    };

    let status = match self.build(&props, &workspace).await {
      Ok(()) => {
        info!(destination = %props.destination, "build succeeded");
        self.success(request)
      }
      Err(e) => {
        error!(error = %e, "build failed");
        TerminalStatus::failed(request, e.to_string())
      }
    };

    Completed {
      status,
      workspace: Some(workspace),
    }
  }

  async fn build(&self, props: &BuildProperties, workspace: &Workspace) -> Result<(), BuildError> {
    let env = Arc::new(self.command_environment(props));
    debug!(env = ?env, "command environment overrides");

    materialize_sources(
      &props.sources,
      workspace,
      self.store.clone(),
      env.clone(),
      self.config.shell.as_deref(),
    )
    .await?;

    let working_dir = workspace.resolve(&props.working_directory);
    if !working_dir.is_dir() {
      return Err(BuildError::MissingWorkingDirectory(display_dir(&props.working_directory)));
    }

    info!(
      dir = %display_dir(&props.working_directory).display(),
      commands = props.build_commands.len(),
      "running build commands"
    );
    run_commands(&props.build_commands, &working_dir, &env, self.config.shell.as_deref())
      .await
      .map_err(BuildError::Build)?;

    let output_dir = workspace.resolve(&props.output_directory);
    if !output_dir.is_dir() {
      return Err(BuildError::MissingOutput(display_dir(&props.output_directory)));
    }

    upload_directory(self.store.as_ref(), &output_dir, &props.destination)
      .await
      .map_err(|source| BuildError::Publish {
        location: props.destination.clone(),
        source,
      })
  }

  /// Environment layered over the inherited one for every setup and build command.
  ///
  /// npm's user config and cache are pointed into the scratch directory because the
  /// hosted runtime only allows writes there. Caller-supplied values win.
  fn command_environment(&self, props: &BuildProperties) -> BTreeMap<String, String> {
    let scratch = &self.config.scratch_dir;
    let mut env = BTreeMap::from([
      (
        "NPM_CONFIG_USERCONFIG".to_string(),
        scratch.join(".npmrc").to_string_lossy().to_string(),
      ),
      (
        "NPM_CONFIG_CACHE".to_string(),
        scratch.join(".npm").to_string_lossy().to_string(),
      ),
    ]);
    env.extend(props.environment.clone());
    env
  }

  fn success(&self, request: &InvocationRequest) -> TerminalStatus {
    TerminalStatus::success(request, default_reason(self.config.log_stream_name.as_deref()))
  }
}
