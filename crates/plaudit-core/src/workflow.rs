//! The external text-generation workflow.
//!
//! The pipeline sends one opaque text blob (`form_payload`) per testimonial
//! and expects back a structured result with `ai_headline`, `ai_body` and an
//! optional `ai_bullets` list. How deeply that result is nested in the
//! response envelope varies between workflow versions, so
//! [`parse_workflow_outputs`] unwraps until stable and tolerates
//! string-encoded output.

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
  payload::stringify,
  schema::{FormFieldDefinition, QuestionAnswer},
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// A single workflow invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRequest {
  /// End-user identifier reported to the workflow service.
  pub user:   String,
  /// Named workflow inputs, sent as given.
  pub inputs: Map<String, Value>,
}

impl WorkflowRequest {
  /// Build the testimonial request for one response. The only input is
  /// `form_payload`, a JSON text blob whose answers are stringified and keep
  /// the order of `answers`. The user is the response id.
  pub fn for_response(company_id: Uuid, response_id: Uuid, answers: &[QuestionAnswer]) -> Self {
    let answers: Vec<Value> = answers
      .iter()
      .map(|qa| {
        json!({
          "key":      qa.key,
          "question": qa.question,
          "answer":   stringify(qa.value.as_ref()),
        })
      })
      .collect();
    let blob = json!({
      "company_id":  company_id,
      "response_id": response_id,
      "answers":     answers,
    });

    let mut inputs = Map::new();
    inputs.insert("form_payload".to_owned(), Value::String(blob.to_string()));
    Self { user: response_id.to_string(), inputs }
  }

  /// Build the form-schema design request for a company: the prepared fields
  /// go in as `fields`, alongside `company_id`.
  pub fn for_schema(company_id: Uuid, fields: &[FormFieldDefinition]) -> Self {
    let fields: Vec<Value> = fields
      .iter()
      .map(|f| {
        let mut field = Map::new();
        field.insert("key".to_owned(), Value::from(f.key.as_str()));
        field.insert("label".to_owned(), Value::from(f.label.as_str()));
        if let Some(t) = &f.field_type {
          field.insert("type".to_owned(), Value::from(t.as_str()));
        }
        if let Some(r) = f.required {
          field.insert("required".to_owned(), Value::Bool(r));
        }
        Value::Object(field)
      })
      .collect();

    let mut inputs = Map::new();
    inputs.insert("company_id".to_owned(), Value::String(company_id.to_string()));
    inputs.insert("fields".to_owned(), Value::Array(fields));
    Self { user: company_id.to_string(), inputs }
  }

  /// The `form_payload` blob of a testimonial request.
  pub fn form_payload(&self) -> Option<&str> {
    self.inputs.get("form_payload").and_then(Value::as_str)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the generation service.
///
/// Implementations return the decoded response body of a successful call; a
/// non-success status must be reported as an error whose `Display` is the
/// upstream message.
pub trait Workflow: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run the workflow to completion (blocking mode, no streaming).
  fn run<'a>(
    &'a self,
    request: &'a WorkflowRequest,
  ) -> impl Future<Output = Result<Value, Self::Error>> + Send + 'a;
}

// ─── Output envelope ─────────────────────────────────────────────────────────

fn unwrap_outputs(mut current: &Value) -> &Value {
  while let Some(inner) = current.as_object().and_then(|o| o.get("outputs")) {
    current = inner;
  }
  current
}

fn output_object(value: &Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map.clone(),
    Value::String(text) => match serde_json::from_str::<Value>(text) {
      Ok(Value::Object(map)) => map,
      _ => Map::new(),
    },
    _ => Map::new(),
  }
}

/// Extract the workflow's output object from a response envelope.
///
/// Looks under `data.outputs` first, then a top-level `outputs`, unwraps any
/// further `outputs` layers, and finally accepts either an object or a string
/// holding a JSON object. Every other shape yields an empty map.
pub fn parse_workflow_outputs(envelope: &Value) -> Map<String, Value> {
  let raw = envelope
    .get("data")
    .filter(|d| d.is_object())
    .and_then(|d| d.get("outputs"))
    .or_else(|| envelope.get("outputs"));

  match raw {
    Some(raw) => output_object(unwrap_outputs(raw)),
    None => Map::new(),
  }
}
