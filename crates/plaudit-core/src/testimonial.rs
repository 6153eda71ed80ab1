//! Testimonial: the publishable artifact derived from one response.
//!
//! There is at most one testimonial per response; stores enforce this with a
//! unique key on `response_id` and create testimonials by upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::stringify;

// ─── AI content ──────────────────────────────────────────────────────────────

/// The fields produced by the generation workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiContent {
  pub ai_headline: String,
  pub ai_body:     String,
  pub ai_bullets:  Vec<String>,
}

impl AiContent {
  /// Read AI content out of a parsed workflow output map.
  ///
  /// `ai_headline` and `ai_body` are taken only when they are strings;
  /// `ai_bullets` only when it is an array. Bullet elements are kept as text
  /// without further validation.
  pub fn from_outputs(outputs: &serde_json::Map<String, serde_json::Value>) -> Self {
    let text = |key: &str| {
      outputs
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned()
    };

    let ai_bullets = outputs
      .get("ai_bullets")
      .and_then(serde_json::Value::as_array)
      .map(|items| items.iter().map(|v| stringify(Some(v))).collect())
      .unwrap_or_default();

    Self {
      ai_headline: text("ai_headline"),
      ai_body: text("ai_body"),
      ai_bullets,
    }
  }
}

// ─── Testimonial ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
  pub testimonial_id: Uuid,
  pub company_id:     Uuid,
  /// Back-reference to the source response (not ownership).
  pub response_id:    Uuid,
  /// Tri-state as stored; `None` is treated as not public.
  pub is_public:      Option<bool>,
  /// Set when the testimonial becomes public.
  pub published_at:   Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub content:        AiContent,
  pub created_at:     DateTime<Utc>,
}

impl Testimonial {
  pub fn is_published(&self) -> bool { self.is_public == Some(true) }
}

/// A public testimonial joined with the response it was derived from; the
/// read model of the embed widget.
#[derive(Debug, Clone)]
pub struct PublishedTestimonial {
  pub testimonial:         Testimonial,
  pub response_payload:    serde_json::Value,
  pub response_created_at: DateTime<Utc>,
}
