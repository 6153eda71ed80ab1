//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Payloads, schemas and bullet lists are stored
//! as compact JSON.

use chrono::{DateTime, Utc};
use plaudit_core::{
  company::{Company, Form},
  response::Response,
  testimonial::{AiContent, Testimonial},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_json(value: &serde_json::Value) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

/// Schemas written by other tools are not guaranteed to be JSON; text that
/// does not parse is kept as a JSON string so the schema normalizer can decide
/// what to do with it.
pub fn decode_schema(s: Option<String>) -> Option<serde_json::Value> {
  s.map(|text| serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
}

pub fn encode_bullets(bullets: &[String]) -> Result<String> {
  Ok(serde_json::to_string(bullets)?)
}

pub fn decode_bullets(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const COMPANY_COLUMNS: &str = "company_id, name, slug, iframe_token, form_schema, \
                                   auto_publish_high_rating, created_at";

/// Raw values read directly from a `companies` row.
pub struct RawCompany {
  pub company_id:   String,
  pub name:         String,
  pub slug:         String,
  pub iframe_token: Option<String>,
  pub form_schema:  Option<String>,
  pub auto_publish: bool,
  pub created_at:   String,
}

impl RawCompany {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      company_id:   row.get(0)?,
      name:         row.get(1)?,
      slug:         row.get(2)?,
      iframe_token: row.get(3)?,
      form_schema:  row.get(4)?,
      auto_publish: row.get(5)?,
      created_at:   row.get(6)?,
    })
  }

  pub fn into_company(self) -> Result<Company> {
    Ok(Company {
      company_id:   decode_uuid(&self.company_id)?,
      name:         self.name,
      slug:         self.slug,
      iframe_token: self.iframe_token,
      form_schema:  decode_schema(self.form_schema),
      auto_publish: self.auto_publish,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const FORM_COLUMNS: &str = "form_id, company_id, slug, created_at";

/// Raw values read directly from a `forms` row.
pub struct RawForm {
  pub form_id:    String,
  pub company_id: String,
  pub slug:       String,
  pub created_at: String,
}

impl RawForm {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      form_id:    row.get(0)?,
      company_id: row.get(1)?,
      slug:       row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_form(self) -> Result<Form> {
    Ok(Form {
      form_id:    decode_uuid(&self.form_id)?,
      company_id: decode_uuid(&self.company_id)?,
      slug:       self.slug,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const RESPONSE_COLUMNS: &str = "response_id, company_id, form_id, payload, created_at";

/// Raw values read directly from a `responses` row.
pub struct RawResponse {
  pub response_id: String,
  pub company_id:  String,
  pub form_id:     String,
  pub payload:     String,
  pub created_at:  String,
}

impl RawResponse {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      response_id: row.get(0)?,
      company_id:  row.get(1)?,
      form_id:     row.get(2)?,
      payload:     row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_response(self) -> Result<Response> {
    Ok(Response {
      response_id: decode_uuid(&self.response_id)?,
      company_id:  decode_uuid(&self.company_id)?,
      form_id:     decode_uuid(&self.form_id)?,
      // An unreadable payload reads as null; the payload accessors treat that
      // as an empty answer map.
      payload:     serde_json::from_str(&self.payload).unwrap_or_default(),
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const TESTIMONIAL_COLUMNS: &str = "testimonial_id, company_id, response_id, is_public, \
                                       published_at, ai_headline, ai_body, ai_bullets, created_at";

/// Raw values read directly from a `testimonials` row.
pub struct RawTestimonial {
  pub testimonial_id: String,
  pub company_id:     String,
  pub response_id:    String,
  pub is_public:      Option<bool>,
  pub published_at:   Option<String>,
  pub ai_headline:    String,
  pub ai_body:        String,
  pub ai_bullets:     String,
  pub created_at:     String,
}

impl RawTestimonial {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      testimonial_id: row.get(0)?,
      company_id:     row.get(1)?,
      response_id:    row.get(2)?,
      is_public:      row.get(3)?,
      published_at:   row.get(4)?,
      ai_headline:    row.get(5)?,
      ai_body:        row.get(6)?,
      ai_bullets:     row.get(7)?,
      created_at:     row.get(8)?,
    })
  }

  pub fn into_testimonial(self) -> Result<Testimonial> {
    Ok(Testimonial {
      testimonial_id: decode_uuid(&self.testimonial_id)?,
      company_id:     decode_uuid(&self.company_id)?,
      response_id:    decode_uuid(&self.response_id)?,
      is_public:      self.is_public,
      published_at:   self.published_at.as_deref().map(decode_dt).transpose()?,
      content:        AiContent {
        ai_headline: self.ai_headline,
        ai_body:     self.ai_body,
        ai_bullets:  decode_bullets(&self.ai_bullets)?,
      },
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
