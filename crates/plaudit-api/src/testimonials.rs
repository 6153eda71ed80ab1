//! Handlers for `/testimonials` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/testimonials/:id/rerun` | Regenerate AI content; returns [`RerunReport`] |
//! | `POST` | `/testimonials/:id/toggle` | Flip visibility |
//! | `POST` | `/testimonials/:id/edit` | Body: `{"ai_headline":"...","ai_body":"..."}` |
//! | `POST` | `/testimonials/auto-publish-high-rating` | Body: `{"company_id":"..."}` |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
};
use chrono::Utc;
use plaudit_core::{
  auto_publish::{AutoPublishOutcome, auto_publish_high_rating},
  rerun::{RerunReport, rerun_testimonial},
  store::TestimonialStore,
  testimonial::Testimonial,
  workflow::Workflow,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Rerun ───────────────────────────────────────────────────────────────────

/// `POST /testimonials/:id/rerun`
pub async fn rerun<S, W>(
  State(state): State<AppState<S, W>>,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RerunReport>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Path(id) = path?;
  let report = rerun_testimonial(&*state.store, &*state.workflow, id).await?;
  Ok(Json(report))
}

// ─── Toggle ──────────────────────────────────────────────────────────────────

/// `POST /testimonials/:id/toggle`: publishing stamps `published_at`,
/// unpublishing clears it.
pub async fn toggle<S, W>(
  State(state): State<AppState<S, W>>,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Testimonial>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Path(id) = path?;
  let current = state
    .store
    .get_testimonial(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("testimonial {id} not found")))?;

  let updated = state
    .store
    .set_visibility(id, !current.is_published(), Utc::now())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("testimonial {id} not found")))?;
  Ok(Json(updated))
}

// ─── Edit ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct EditBody {
  pub ai_headline: String,
  pub ai_body:     String,
}

/// `POST /testimonials/:id/edit`: both fields are trimmed and must be
/// non-empty. Bullets are left untouched.
pub async fn edit<S, W>(
  State(state): State<AppState<S, W>>,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<EditBody>, JsonRejection>,
) -> Result<Json<EditBody>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Path(id) = path?;
  let Json(body) = body?;

  let headline = body.ai_headline.trim();
  let text = body.ai_body.trim();
  if headline.is_empty() || text.is_empty() {
    return Err(ApiError::BadRequest("invalid payload".to_owned()));
  }

  let updated = state
    .store
    .edit_ai_text(id, headline, text)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("testimonial {id} not found")))?;

  Ok(Json(EditBody {
    ai_headline: updated.content.ai_headline,
    ai_body:     updated.content.ai_body,
  }))
}

// ─── Batch auto-publish ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompanyBody {
  #[serde(alias = "companyId")]
  pub company_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
  pub message: String,
  pub updated: usize,
}

/// The user-facing summary of a batch pass.
pub(crate) fn batch_message(outcome: AutoPublishOutcome) -> String {
  match outcome {
    AutoPublishOutcome::Empty => "公開対象となるクチコミがまだありません。".to_owned(),
    AutoPublishOutcome::NoneQualified => {
      "☆4以上の新しい公開対象は見つかりませんでした。".to_owned()
    }
    AutoPublishOutcome::Updated { updated } => format!("☆4以上の{updated}件を公開しました。"),
  }
}

/// `POST /testimonials/auto-publish-high-rating`
pub async fn auto_publish<S, W>(
  State(state): State<AppState<S, W>>,
  body: Result<Json<CompanyBody>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Json(body) = body?;
  let outcome = auto_publish_high_rating(&*state.store, body.company_id).await?;
  Ok(Json(BatchResponse { message: batch_message(outcome), updated: outcome.updated() }))
}
