//! Error type for `plaudit-dify`.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("workflow request failed: {0}")]
  Transport(#[from] reqwest::Error),

  /// The service answered with a non-success status. Displays as the
  /// upstream message alone so it can be surfaced to callers unchanged.
  #[error("{message}")]
  Status { status: StatusCode, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
