//! Response: one raw survey submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A survey submission. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  pub response_id: Uuid,
  pub company_id:  Uuid,
  pub form_id:     Uuid,
  /// Free-form answers keyed by field key. Always an object when written by
  /// the submission endpoint, but read through [`crate::payload`] which does
  /// not assume so.
  pub payload:     serde_json::Value,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::TestimonialStore::insert_response`].
/// `response_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewResponse {
  pub company_id: Uuid,
  pub form_id:    Uuid,
  pub payload:    serde_json::Value,
}
