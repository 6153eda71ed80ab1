//! Company-wide auto-publish pass.
//!
//! Promotes every not-yet-public testimonial of a company whose response is
//! rated at or above [`AUTO_PUBLISH_MIN_RATING`]. Run once when the setting is
//! switched on and on manual request; new testimonials are covered afterwards
//! by the per-item check in [`crate::rerun`].

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{AUTO_PUBLISH_MIN_RATING, AutoPublishError, store::TestimonialStore};

/// The non-error outcomes of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutoPublishOutcome {
  /// The company has no testimonials at all.
  Empty,
  /// Testimonials exist but none qualified.
  #[serde(rename = "none")]
  NoneQualified,
  Updated { updated: usize },
}

impl AutoPublishOutcome {
  pub fn updated(&self) -> usize {
    match self {
      Self::Updated { updated } => *updated,
      Self::Empty | Self::NoneQualified => 0,
    }
  }
}

/// Publish every qualifying testimonial of `company_id`.
pub async fn auto_publish_high_rating<S: TestimonialStore>(
  store: &S,
  company_id: Uuid,
) -> Result<AutoPublishOutcome, AutoPublishError> {
  let testimonials = store
    .list_testimonials(company_id)
    .await
    .map_err(|e| AutoPublishError::LoadTestimonials(Box::new(e)))?;

  if testimonials.is_empty() {
    return Ok(AutoPublishOutcome::Empty);
  }

  let mut seen = HashSet::new();
  let response_ids: Vec<Uuid> = testimonials
    .iter()
    .map(|t| t.response_id)
    .filter(|id| !id.is_nil() && seen.insert(*id))
    .collect();

  if response_ids.is_empty() {
    return Ok(AutoPublishOutcome::Empty);
  }

  let ratings = store
    .response_ratings(&response_ids)
    .await
    .map_err(|e| AutoPublishError::LoadRatings(Box::new(e)))?;

  let publish_ids: Vec<Uuid> = testimonials
    .iter()
    .filter(|t| !t.is_published())
    .filter(|t| {
      ratings
        .get(&t.response_id)
        .is_some_and(|r| *r >= AUTO_PUBLISH_MIN_RATING)
    })
    .map(|t| t.testimonial_id)
    .collect();

  if publish_ids.is_empty() {
    return Ok(AutoPublishOutcome::NoneQualified);
  }

  let updated = store
    .publish_testimonials(&publish_ids, Utc::now())
    .await
    .map_err(|e| AutoPublishError::Publish(Box::new(e)))?;

  tracing::info!(%company_id, updated, candidates = publish_ids.len(), "auto-published testimonials");

  Ok(AutoPublishOutcome::Updated { updated })
}
