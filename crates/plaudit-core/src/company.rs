//! Company, the tenant root, and its single public form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant. Every response and testimonial belongs to exactly one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
  pub company_id:   Uuid,
  pub name:         String,
  /// Globally unique; addresses the embed widget.
  pub slug:         String,
  /// Shared secret required by the embed widget. `None` disables embedding.
  #[serde(skip_serializing)]
  pub iframe_token: Option<String>,
  /// The raw question-schema document, exactly as stored. May be an object,
  /// a JSON-encoded string, or anything else an older editor wrote; see
  /// [`crate::schema::parse_schema_fields`].
  pub form_schema:  Option<serde_json::Value>,
  pub auto_publish: bool,
  pub created_at:   DateTime<Utc>,
}

/// The subset of a company read by the rerun pipeline.
#[derive(Debug, Clone, Default)]
pub struct CompanySettings {
  pub auto_publish: bool,
  pub form_schema:  Option<serde_json::Value>,
}

impl From<&Company> for CompanySettings {
  fn from(c: &Company) -> Self {
    Self {
      auto_publish: c.auto_publish,
      form_schema:  c.form_schema.clone(),
    }
  }
}

/// Input to [`crate::store::TestimonialStore::create_company`]. The store
/// creates the company and its form together.
#[derive(Debug, Clone)]
pub struct NewCompany {
  pub name:         String,
  pub slug:         String,
  pub iframe_token: Option<String>,
  pub form_slug:    String,
}

/// The public submission form of a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
  pub form_id:    Uuid,
  pub company_id: Uuid,
  /// Immutable; addresses the submission endpoint.
  pub slug:       String,
  pub created_at: DateTime<Utc>,
}
