//! Lifecycle callback protocol.
//!
//! Every invocation ends with exactly one terminal status delivered to the
//! caller's response address. The status carries the outcome, a reason, the
//! caller's correlation identifiers, and a physical resource id that must stay
//! stable across Create and Update for the same resource.

pub mod callback;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::consts::PHYSICAL_ID_HASH_LEN;
use crate::event::{Correlation, InvocationRequest};

pub use callback::{CallbackClient, DeliveryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
  Success,
  Failed,
}

/// The single outcome report of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalStatus {
  pub outcome: Outcome,
  pub reason: String,
  pub correlation: Correlation,
  pub physical_resource_id: String,
}

impl TerminalStatus {
  pub fn success(request: &InvocationRequest, reason: impl Into<String>) -> Self {
    Self::new(request, Outcome::Success, reason.into())
  }

  pub fn failed(request: &InvocationRequest, reason: impl Into<String>) -> Self {
    Self::new(request, Outcome::Failed, reason.into())
  }

  fn new(request: &InvocationRequest, outcome: Outcome, reason: String) -> Self {
    Self {
      outcome,
      reason,
      correlation: request.correlation.clone(),
      physical_resource_id: physical_resource_id(request),
    }
  }

  pub fn is_success(&self) -> bool {
    self.outcome == Outcome::Success
  }

  /// Serialize the callback body.
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ResponseBody {
      status: self.outcome,
      reason: &self.reason,
      physical_resource_id: &self.physical_resource_id,
      stack_id: &self.correlation.stack_id,
      request_id: &self.correlation.request_id,
      logical_resource_id: &self.correlation.logical_resource_id,
      no_echo: false,
      data: serde_json::Map::new(),
    })
  }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseBody<'a> {
  status: Outcome,
  reason: &'a str,
  physical_resource_id: &'a str,
  stack_id: &'a str,
  request_id: &'a str,
  logical_resource_id: &'a str,
  no_echo: bool,
  data: serde_json::Map<String, serde_json::Value>,
}

/// The physical id reported for this request.
///
/// Update and Delete events carry the id reported earlier, which is echoed back.
/// Create events get an id derived from the stack and logical id, so a resource
/// keeps the same id for its whole life.
pub fn physical_resource_id(request: &InvocationRequest) -> String {
  match &request.physical_resource_id {
    Some(id) if !id.is_empty() => id.clone(),
    _ => derive_physical_id(&request.correlation),
  }
}

fn derive_physical_id(correlation: &Correlation) -> String {
  let mut hasher = Sha256::new();
  hasher.update(correlation.stack_id.as_bytes());
  hasher.update(b"/");
  hasher.update(correlation.logical_resource_id.as_bytes());
  let digest = hex::encode(hasher.finalize());
  format!("{}-{}", correlation.logical_resource_id, &digest[..PHYSICAL_ID_HASH_LEN])
}

/// Reason reported on success, pointing at wherever the detailed log lives.
pub fn default_reason(log_stream_name: Option<&str>) -> String {
  match log_stream_name {
    Some(name) => format!("See the details in the log stream: {name}"),
    None => "See the details in the worker log".to_string(),
  }
}
