//! Error type for `plaudit-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A company or form slug collided with an existing one.
  #[error("slug already in use: {0}")]
  SlugTaken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
