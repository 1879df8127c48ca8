//! Implementation of the `nodebuild invoke` command.
//!
//! Runs one lifecycle event end to end: build, publish, report, clean up.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::debug;

use nodebuild_lib::{Worker, WorkerConfig};

use crate::output::{format_duration, print_error, print_stat, print_success};

/// Execute the invoke command.
///
/// Fails (non-zero exit) when the build failed or the terminal status could not be delivered.
pub fn cmd_invoke(event: Option<&str>, config: WorkerConfig) -> Result<()> {
  let start = Instant::now();
  let request = super::read_event(event)?;
  debug!(scratch_dir = %config.scratch_dir.display(), store = ?config.store, "worker configuration");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(async {
    let worker = Worker::from_config(config).await;
    worker.invoke(&request).await
  });

  let status = &outcome.status;
  if status.is_success() {
    print_success(&format!("{} {} complete", request.request_type, request.correlation.logical_resource_id));
  } else {
    print_error(&format!("{} {} failed", request.request_type, request.correlation.logical_resource_id));
  }
  print_stat("Physical ID", &status.physical_resource_id);
  print_stat("Reason", &status.reason);
  print_stat("Duration", &format_duration(start.elapsed()));

  if let Err(e) = &outcome.delivery {
    print_error(&format!("Terminal status was not delivered: {}", e));
  }

  if !outcome.is_success() {
    bail!("invocation did not succeed");
  }
  Ok(())
}
