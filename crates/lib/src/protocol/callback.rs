//! Delivery of the terminal status to the response address.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::TerminalStatus;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DeliveryError {
  #[error("failed to serialize terminal status: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to deliver terminal status to {url}: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("response address {url} rejected terminal status with HTTP {status}")]
  Rejected { url: String, status: u16 },
}

#[derive(Debug, Clone)]
pub struct CallbackClient {
  http: reqwest::Client,
}

impl CallbackClient {
  pub fn new() -> Self {
    Self::from_builder(reqwest::Client::builder().timeout(DELIVERY_TIMEOUT))
  }

  /// Build from `builder`, falling back to a default client if it cannot be built.
  ///
  /// Every invocation must still get its one delivery attempt.
  pub fn from_builder(builder: reqwest::ClientBuilder) -> Self {
    let http = match builder.build() {
      Ok(http) => http,
      Err(e) => {
        warn!(error = %e, "could not configure HTTP client, using defaults");
        reqwest::Client::new()
      }
    };
    Self { http }
  }

  /// PUT `status` to `url`. Called once per invocation; never retried.
  ///
  /// The empty `Content-Type` header is what presigned response URLs are signed
  /// with, so it is sent literally.
  pub async fn notify(&self, url: &str, status: &TerminalStatus) -> Result<(), DeliveryError> {
    let body = status.to_json()?;
    let shown = redact(url);
    debug!(url = %shown, body = %body, "sending terminal status");

    let response = self
      .http
      .put(url)
      .header(CONTENT_TYPE, "")
      .header(CONTENT_LENGTH, body.len())
      .body(body)
      .send()
      .await
      .map_err(|source| DeliveryError::Request {
        url: shown.clone(),
        source,
      })?;

    let code = response.status();
    if !code.is_success() {
      return Err(DeliveryError::Rejected {
        url: shown,
        status: code.as_u16(),
      });
    }

    info!(outcome = ?status.outcome, http_status = code.as_u16(), "terminal status delivered");
    Ok(())
  }
}

impl Default for CallbackClient {
  fn default() -> Self {
    Self::new()
  }
}

/// Drop the query string, which carries the presigned signature.
fn redact(url: &str) -> String {
  url.split('?').next().unwrap_or(url).to_string()
}
