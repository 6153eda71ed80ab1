//! Async HTTP client for the Dify workflow service.
//!
//! [`DifyClient`] implements [`plaudit_core::workflow::Workflow`] by running a
//! workflow in blocking mode and returning the decoded response envelope. The
//! envelope is interpreted by
//! [`plaudit_core::workflow::parse_workflow_outputs`], not here.

pub mod error;

use std::time::Duration;

use plaudit_core::workflow::{Workflow, WorkflowRequest};
use reqwest::Client;
use serde_json::{Value, json};

pub use error::{Error, Result};

/// Connection settings for the Dify API.
#[derive(Debug, Clone)]
pub struct DifyConfig {
  pub base_url:     String,
  pub api_key:      String,
  pub timeout_secs: u64,
}

/// Async HTTP client for the Dify workflow API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct DifyClient {
  client: Client,
  config: DifyConfig,
}

impl DifyClient {
  pub fn new(config: DifyConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/v1{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// `POST /v1/workflows/run`
  pub async fn run_workflow(&self, request: &WorkflowRequest) -> Result<Value> {
    let body = json!({
      "response_mode": "blocking",
      "user": request.user,
      "inputs": request.inputs,
    });

    let resp = self
      .client
      .post(self.url("/workflows/run"))
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
      tracing::warn!(%status, user = %request.user, "workflow run rejected");
      let message = if text.is_empty() { "dify error".to_owned() } else { text };
      return Err(Error::Status { status, message });
    }

    Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
      tracing::warn!(user = %request.user, error = %e, "workflow returned a non-JSON body");
      Value::Null
    }))
  }
}

impl Workflow for DifyClient {
  type Error = Error;

  async fn run(&self, request: &WorkflowRequest) -> Result<Value> {
    self.run_workflow(request).await
  }
}
