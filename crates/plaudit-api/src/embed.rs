//! `GET /embed/:company_slug?token=<iframe token>`: the widget feed.

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::PathRejection,
  },
};
use plaudit_core::{
  payload::{payload_map, read_number, read_string},
  store::TestimonialStore,
  testimonial::PublishedTestimonial,
  workflow::Workflow,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct EmbedParams {
  #[serde(default)]
  pub token: String,
}

/// One card of the widget.
#[derive(Debug, Serialize)]
pub struct EmbedItem {
  pub id:      Uuid,
  pub title:   String,
  pub body:    String,
  pub bullets: Vec<String>,
  pub name:    Option<String>,
  pub rating:  Option<f64>,
  /// `YYYY-MM-DD` of publication, falling back to the submission date.
  pub date:    String,
}

impl From<PublishedTestimonial> for EmbedItem {
  fn from(p: PublishedTestimonial) -> Self {
    let payload = payload_map(&p.response_payload);
    let date = p.testimonial.published_at.unwrap_or(p.response_created_at);
    Self {
      id:      p.testimonial.testimonial_id,
      title:   p.testimonial.content.ai_headline,
      body:    p.testimonial.content.ai_body,
      bullets: p.testimonial.content.ai_bullets,
      name:    read_string(&payload, "name").map(str::to_owned),
      rating:  read_number(&payload, "rating"),
      date:    date.format("%Y-%m-%d").to_string(),
    }
  }
}

/// `GET /embed/:company_slug?token=<token>`: 404 unless the slug and token
/// both match.
pub async fn list<S, W>(
  State(state): State<AppState<S, W>>,
  path: Result<Path<String>, PathRejection>,
  Query(params): Query<EmbedParams>,
) -> Result<Json<Vec<EmbedItem>>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Path(slug) = path?;
  if params.token.is_empty() {
    return Err(ApiError::NotFound("not found".to_owned()));
  }

  let company = state
    .store
    .company_for_embed(&slug, &params.token)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("not found".to_owned()))?;

  let published = state
    .store
    .list_published(company.company_id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(published.into_iter().map(EmbedItem::from).collect()))
}
