//! The AI rerun pipeline for a single testimonial.
//!
//! Loads the testimonial and its response, asks the workflow for new content,
//! overwrites the AI fields and finally applies the company's auto-publish
//! policy. The workflow call is the expensive step; once its result is saved,
//! nothing after it can fail the rerun.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  AUTO_PUBLISH_MIN_RATING, RerunError,
  company::CompanySettings,
  payload::{extract_payload, read_number},
  schema::{build_question_answer_list, parse_schema_fields},
  store::TestimonialStore,
  testimonial::{AiContent, Testimonial},
  workflow::{Workflow, WorkflowRequest, parse_workflow_outputs},
};

// ─── Result types ────────────────────────────────────────────────────────────

/// What happened to visibility after the AI content was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
  /// Auto-publish was disabled, the rating was missing or too low, or the
  /// testimonial was already public.
  Skipped,
  Published { at: DateTime<Utc> },
  /// The publish update failed; the AI content is still saved.
  Failed { error: String },
}

/// The result of a successful rerun.
#[derive(Debug, Clone, Serialize)]
pub struct RerunReport {
  pub testimonial_id: Uuid,
  pub content:        AiContent,
  pub publish:        PublishOutcome,
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// Whether a single testimonial should be promoted after a rerun.
pub fn should_auto_publish(
  auto_publish: bool,
  rating: Option<f64>,
  testimonial: &Testimonial,
) -> bool {
  auto_publish
    && rating.is_some_and(|r| r >= AUTO_PUBLISH_MIN_RATING)
    && !testimonial.is_published()
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Read company settings, retrying once. Any failure is logged and treated as
/// "auto-publish disabled, no schema".
async fn load_settings<S: TestimonialStore>(store: &S, company_id: Uuid) -> CompanySettings {
  for attempt in 1..=2 {
    match store.company_settings(company_id).await {
      Ok(settings) => return settings.unwrap_or_default(),
      Err(e) => {
        tracing::warn!(%company_id, attempt, error = %e, "failed to load company settings");
      }
    }
  }
  CompanySettings::default()
}

/// Regenerate the AI content of testimonial `id` and apply auto-publish.
pub async fn rerun_testimonial<S, W>(
  store: &S,
  workflow: &W,
  id: Uuid,
) -> Result<RerunReport, RerunError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let testimonial = store
    .get_testimonial(id)
    .await
    .map_err(|e| RerunError::Persistence(Box::new(e)))?
    .ok_or(RerunError::TestimonialNotFound(id))?;

  let response = store
    .get_response(testimonial.response_id)
    .await
    .map_err(|e| RerunError::Persistence(Box::new(e)))?
    .ok_or(RerunError::ResponseNotFound(testimonial.response_id))?;

  let settings = load_settings(store, testimonial.company_id).await;

  let payload = extract_payload(&response);
  let rating = read_number(&payload, "rating");
  let fields = parse_schema_fields(settings.form_schema.as_ref());
  let answers = build_question_answer_list(&payload, &fields);

  let request = WorkflowRequest::for_response(testimonial.company_id, response.response_id, &answers);

  let envelope = workflow
    .run(&request)
    .await
    .map_err(|e| RerunError::Upstream(e.to_string()))?;

  let outputs = parse_workflow_outputs(&envelope);
  if outputs.is_empty() {
    tracing::warn!(testimonial_id = %id, "workflow returned no usable output");
  }
  let content = AiContent::from_outputs(&outputs);

  let saved = store
    .save_ai_content(id, &content)
    .await
    .map_err(|e| RerunError::Persistence(Box::new(e)))?;
  if !saved {
    return Err(RerunError::TestimonialNotFound(id));
  }

  let publish = if should_auto_publish(settings.auto_publish, rating, &testimonial) {
    let at = Utc::now();
    match store.publish_testimonial(id, at).await {
      Ok(true) => {
        tracing::info!(testimonial_id = %id, ?rating, "auto-published testimonial");
        PublishOutcome::Published { at }
      }
      // Someone else published it in the meantime.
      Ok(false) => PublishOutcome::Skipped,
      Err(e) => {
        tracing::error!(testimonial_id = %id, error = %e, "failed to auto-publish testimonial");
        PublishOutcome::Failed { error: e.to_string() }
      }
    }
  } else {
    PublishOutcome::Skipped
  };

  Ok(RerunReport { testimonial_id: id, content, publish })
}
