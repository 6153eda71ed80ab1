//! Handlers for `/companies` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/companies/auto-publish-setting` | Body: `{"company_id":"...","enabled":true}` |
//! | `POST` | `/companies/form-schema` | Body: `{"company_id":"...","fields":[...]}` |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use plaudit_core::{
  auto_publish::auto_publish_high_rating,
  schema::{
    FieldDraft, FormFieldDefinition, prepare_schema_fields, schema_document, schema_from_outputs,
    validate_schema_fields,
  },
  store::TestimonialStore,
  workflow::{Workflow, WorkflowRequest, parse_workflow_outputs},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, error::ApiError, testimonials::batch_message};

// ─── Auto-publish setting ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SettingBody {
  #[serde(alias = "companyId")]
  pub company_id: Uuid,
  pub enabled:    bool,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
  pub message: String,
  pub updated: usize,
  pub enabled: bool,
}

/// `POST /companies/auto-publish-setting`: switching the setting on also
/// runs a batch pass over the existing testimonials.
pub async fn auto_publish_setting<S, W>(
  State(state): State<AppState<S, W>>,
  body: Result<Json<SettingBody>, JsonRejection>,
) -> Result<Json<SettingResponse>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Json(body) = body?;
  let company_id = body.company_id;

  let found = state
    .store
    .set_auto_publish(company_id, body.enabled)
    .await
    .map_err(ApiError::store)?;
  if !found {
    return Err(ApiError::NotFound(format!("company {company_id} not found")));
  }

  if !body.enabled {
    return Ok(Json(SettingResponse {
      message: "自動公開をオフにしました。".to_owned(),
      updated: 0,
      enabled: false,
    }));
  }

  let outcome = auto_publish_high_rating(&*state.store, company_id).await?;
  Ok(Json(SettingResponse {
    message: format!("自動公開をオンにしました。{}", batch_message(outcome)),
    updated: outcome.updated(),
    enabled: true,
  }))
}

// ─── Form schema ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SchemaBody {
  #[serde(alias = "companyId")]
  pub company_id: Uuid,
  pub fields:     Vec<FieldDraft>,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
  pub ok:     bool,
  pub schema: Value,
}

/// Ask the schema workflow to design the form from the prepared fields. The
/// designed schema must still carry the locked fields and unique keys.
async fn design_schema<W: Workflow>(
  workflow: &W,
  company_id: Uuid,
  fields: &[FormFieldDefinition],
) -> Result<Vec<FormFieldDefinition>, ApiError> {
  let envelope = workflow
    .run(&WorkflowRequest::for_schema(company_id, fields))
    .await
    .map_err(|e| ApiError::Upstream(e.to_string()))?;

  schema_from_outputs(&parse_workflow_outputs(&envelope)).map_err(|e| {
    tracing::warn!(%company_id, error = %e, "schema workflow returned an unusable schema");
    ApiError::Upstream(format!("invalid schema from workflow: {e}"))
  })
}

/// `POST /companies/form-schema`: assigns unique keys, checks that the
/// locked fields are present and stores `{"fields": [...]}`. With a schema
/// workflow configured, the stored fields are the ones it designs.
pub async fn form_schema<S, W>(
  State(state): State<AppState<S, W>>,
  body: Result<Json<SchemaBody>, JsonRejection>,
) -> Result<Json<SchemaResponse>, ApiError>
where
  S: TestimonialStore,
  W: Workflow,
{
  let Json(body) = body?;

  let mut fields = prepare_schema_fields(&body.fields);
  validate_schema_fields(&fields).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  if let Some(workflow) = &state.schema_workflow {
    fields = design_schema(&**workflow, body.company_id, &fields).await?;
  }
  let schema = schema_document(&fields).map_err(ApiError::store)?;

  let found = state
    .store
    .set_form_schema(body.company_id, schema.clone())
    .await
    .map_err(ApiError::store)?;
  if !found {
    return Err(ApiError::NotFound(format!("company {} not found", body.company_id)));
  }

  tracing::info!(company_id = %body.company_id, fields = fields.len(), "saved form schema");
  Ok(Json(SchemaResponse { ok: true, schema }))
}
