//! `POST /submit/:form_slug`: the public survey form endpoint.
//!
//! Stores the answers as a response, creates its testimonial stub and runs
//! the rerun pipeline before answering. A failed rerun does not fail the
//! submission; the testimonial can be regenerated later.

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use plaudit_core::{
  payload::{read_number, read_string, stringify},
  rerun::{RerunReport, rerun_testimonial},
  response::NewResponse,
  schema::{FormFieldDefinition, LOCKED_FIELD_KEYS, parse_schema_fields},
  store::TestimonialStore,
  workflow::Workflow,
};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
  pub response_id:    Uuid,
  pub testimonial_id: Uuid,
  /// `None` when the rerun failed.
  pub rerun:          Option<RerunReport>,
}

/// Check and normalise a submission in place.
///
/// `name` is trimmed, `rating` becomes an integer and `consent` becomes
/// `true`; every other answer is stored as sent.
pub fn validate_submission(
  payload: &mut Map<String, Value>,
  fields: &[FormFieldDefinition],
) -> Result<(), String> {
  let name = read_string(payload, "name")
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .ok_or("name is required")?
    .to_owned();

  let rating = read_number(payload, "rating")
    .filter(|r| r.fract() == 0.0 && (1.0..=5.0).contains(r))
    .ok_or("rating must be an integer from 1 to 5")?;

  let consent = match payload.get("consent") {
    Some(Value::Bool(b)) => *b,
    Some(Value::String(s)) => s == "on",
    _ => false,
  };
  if !consent {
    return Err("consent required".to_owned());
  }

  for field in fields {
    if field.required != Some(true) || LOCKED_FIELD_KEYS.contains(&field.key.as_str()) {
      continue;
    }
    if stringify(payload.get(&field.key)).trim().is_empty() {
      return Err(format!("{} is required", field.label));
    }
  }

  payload.insert("name".to_owned(), Value::from(name));
  payload.insert("rating".to_owned(), Value::from(rating as i64));
  payload.insert("consent".to_owned(), Value::Bool(true));
  Ok(())
}

/// `POST /submit/:form_slug`: returns 201 + [`SubmitResponse`].
pub async fn submit<S, W>(
  State(state): State<AppState<S, W>>,
  path: Result<Path<String>, PathRejection>,
  body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Path(form_slug) = path?;
  let Json(mut payload) = body?;

  let form = state
    .store
    .form_by_slug(&form_slug)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("form not found".to_owned()))?;

  let settings = state
    .store
    .company_settings(form.company_id)
    .await
    .map_err(ApiError::store)?
    .unwrap_or_default();
  let fields = parse_schema_fields(settings.form_schema.as_ref());
  validate_submission(&mut payload, &fields).map_err(ApiError::BadRequest)?;

  let response = state
    .store
    .insert_response(NewResponse {
      company_id: form.company_id,
      form_id:    form.form_id,
      payload:    Value::Object(payload),
    })
    .await
    .map_err(ApiError::store)?;

  let testimonial = state
    .store
    .upsert_testimonial(response.company_id, response.response_id)
    .await
    .map_err(ApiError::store)?;

  let rerun = match rerun_testimonial(&*state.store, &*state.workflow, testimonial.testimonial_id)
    .await
  {
    Ok(report) => Some(report),
    Err(e) => {
      tracing::warn!(
        testimonial_id = %testimonial.testimonial_id,
        error = %e,
        "rerun after submission failed"
      );
      None
    }
  };

  Ok((
    StatusCode::CREATED,
    Json(SubmitResponse {
      response_id: response.response_id,
      testimonial_id: testimonial.testimonial_id,
      rerun,
    }),
  ))
}
