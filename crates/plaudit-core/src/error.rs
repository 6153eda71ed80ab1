//! Error types for `plaudit-core`.

use thiserror::Error;
use uuid::Uuid;

/// A type-erased error from a store or workflow backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("schema must contain at least one field")]
  EmptySchema,

  #[error("missing required field: {0}")]
  MissingLockedField(&'static str),

  #[error("duplicate field key: {0}")]
  DuplicateKey(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of the rerun pipeline. Anything not listed here (malformed
/// workflow output, unreadable company settings, a failed auto-publish
/// update) is degraded and logged rather than surfaced.
#[derive(Debug, Error)]
pub enum RerunError {
  #[error("testimonial not found: {0}")]
  TestimonialNotFound(Uuid),

  #[error("response not found: {0}")]
  ResponseNotFound(Uuid),

  /// The workflow service returned a non-success status or was unreachable.
  /// Carries the upstream message verbatim.
  #[error("{0}")]
  Upstream(String),

  #[error("persistence error: {0}")]
  Persistence(#[source] BoxError),
}

impl RerunError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::TestimonialNotFound(_) | Self::ResponseNotFound(_))
  }
}

/// Failure of a batch auto-publish pass.
#[derive(Debug, Error)]
pub enum AutoPublishError {
  #[error("failed to load testimonials: {0}")]
  LoadTestimonials(#[source] BoxError),

  #[error("failed to load ratings: {0}")]
  LoadRatings(#[source] BoxError),

  #[error("failed to publish testimonials: {0}")]
  Publish(#[source] BoxError),
}
