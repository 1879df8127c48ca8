mod invoke;
mod validate;

use std::io::Read;

use anyhow::{Context, Result};

use nodebuild_lib::InvocationRequest;

pub use invoke::cmd_invoke;
pub use validate::cmd_validate;

/// Read and parse an event from `path`, or from stdin when `path` is absent or `-`.
fn read_event(path: Option<&str>) -> Result<InvocationRequest> {
  let json = match path {
    None | Some("-") => {
      let mut buf = String::new();
      std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read event from stdin")?;
      buf
    }
    Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read event file: {}", path))?,
  };

  InvocationRequest::from_json(&json).context("Failed to parse event")
}
