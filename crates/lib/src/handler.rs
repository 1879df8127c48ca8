//! Invocation handling.
//!
//! Ties one lifecycle event to one build run, exactly one callback delivery,
//! and workspace removal, in that order.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::build::BuildRunner;
use crate::config::WorkerConfig;
use crate::event::InvocationRequest;
use crate::protocol::{CallbackClient, DeliveryError, TerminalStatus};
use crate::store::{ArchiveStore, open_store};

/// What happened to an invocation.
#[derive(Debug)]
pub struct InvocationOutcome {
  pub status: TerminalStatus,

  /// Result of the single callback delivery. Failures are logged and never retried.
  pub delivery: Result<(), DeliveryError>,
}

impl InvocationOutcome {
  /// True when the build succeeded and the caller was told so.
  pub fn is_success(&self) -> bool {
    self.status.is_success() && self.delivery.is_ok()
  }
}

pub struct Worker {
  runner: BuildRunner,
  callback: CallbackClient,
}

impl Worker {
  pub fn new(store: Arc<dyn ArchiveStore>, config: WorkerConfig) -> Self {
    Self {
      runner: BuildRunner::new(store, config),
      callback: CallbackClient::new(),
    }
  }

  /// Build a worker with the store selected by `config`.
  pub async fn from_config(config: WorkerConfig) -> Self {
    let store = open_store(&config.store).await;
    Self::new(store, config)
  }

  /// Handle one event: run it, report the terminal status once, then clean up.
  pub async fn invoke(&self, request: &InvocationRequest) -> InvocationOutcome {
    info!(
      kind = %request.request_type,
      request_id = %request.correlation.request_id,
      logical_resource_id = %request.correlation.logical_resource_id,
      "invocation received"
    );
    if let Ok(event) = serde_json::to_string(request) {
      debug!(event = %event, "invocation event");
    }

    let completed = self.runner.execute(request).await;

    let delivery = self.callback.notify(&request.response_url, &completed.status).await;
    if let Err(e) = &delivery {
      error!(error = %e, "terminal status was not delivered");
    }

    let status = completed.finish();
    info!(outcome = ?status.outcome, "invocation finished");

    InvocationOutcome { status, delivery }
  }
}
