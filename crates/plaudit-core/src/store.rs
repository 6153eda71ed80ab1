//! The `TestimonialStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `plaudit-store-sqlite`).
//! The pipeline in [`crate::rerun`] and [`crate::auto_publish`] and the HTTP
//! layer depend on this abstraction, not on any concrete backend.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  company::{Company, CompanySettings, Form, NewCompany},
  response::{NewResponse, Response},
  testimonial::{AiContent, PublishedTestimonial, Testimonial},
};

/// Abstraction over a Plaudit store backend.
///
/// Methods addressing a single row by id return `Ok(None)` / `Ok(false)` when
/// the row does not exist; `Err` is reserved for backend failures.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait TestimonialStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Companies ─────────────────────────────────────────────────────────

  /// Create a company together with its public form.
  fn create_company(
    &self,
    input: NewCompany,
  ) -> impl Future<Output = Result<(Company, Form), Self::Error>> + Send + '_;

  fn get_company(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + '_;

  /// The auto-publish flag and raw question schema of a company.
  fn company_settings(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CompanySettings>, Self::Error>> + Send + '_;

  /// Look up a company for the embed widget. Returns `None` unless both the
  /// slug and the iframe token match.
  fn company_for_embed<'a>(
    &'a self,
    slug: &'a str,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + 'a;

  /// Returns `false` if the company does not exist.
  fn set_auto_publish(
    &self,
    id: Uuid,
    enabled: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Replace the stored question schema. Returns `false` if the company does
  /// not exist.
  fn set_form_schema(
    &self,
    id: Uuid,
    schema: serde_json::Value,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Forms ─────────────────────────────────────────────────────────────

  fn form_by_slug<'a>(
    &'a self,
    slug: &'a str,
  ) -> impl Future<Output = Result<Option<Form>, Self::Error>> + Send + 'a;

  // ── Responses ─────────────────────────────────────────────────────────

  fn insert_response(
    &self,
    input: NewResponse,
  ) -> impl Future<Output = Result<Response, Self::Error>> + Send + '_;

  fn get_response(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Response>, Self::Error>> + Send + '_;

  /// Resolve the numeric rating of each listed response. Responses that do
  /// not exist or carry no numeric rating are absent from the map.
  fn response_ratings<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashMap<Uuid, f64>, Self::Error>> + Send + 'a;

  // ── Testimonials ──────────────────────────────────────────────────────

  /// Insert the testimonial for `response_id`, or return the existing one.
  /// There is never more than one testimonial per response.
  fn upsert_testimonial(
    &self,
    company_id: Uuid,
    response_id: Uuid,
  ) -> impl Future<Output = Result<Testimonial, Self::Error>> + Send + '_;

  fn get_testimonial(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Testimonial>, Self::Error>> + Send + '_;

  fn list_testimonials(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Testimonial>, Self::Error>> + Send + '_;

  /// Overwrite the AI fields. Returns `false` if the testimonial does not
  /// exist.
  fn save_ai_content<'a>(
    &'a self,
    id: Uuid,
    content: &'a AiContent,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Replace only headline and body (manual edit). Returns the updated row.
  fn edit_ai_text<'a>(
    &'a self,
    id: Uuid,
    headline: &'a str,
    body: &'a str,
  ) -> impl Future<Output = Result<Option<Testimonial>, Self::Error>> + Send + 'a;

  /// Conditionally publish: sets `is_public = true` and `published_at = at`
  /// only if the testimonial is not already public. Returns whether a row
  /// changed.
  fn publish_testimonial(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Bulk form of [`TestimonialStore::publish_testimonial`]. Returns the
  /// number of rows that changed.
  fn publish_testimonials<'a>(
    &'a self,
    ids: &'a [Uuid],
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Unconditionally set visibility (manual toggle). `published_at` is set to
  /// `at` when publishing and cleared when un-publishing.
  fn set_visibility(
    &self,
    id: Uuid,
    is_public: bool,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Testimonial>, Self::Error>> + Send + '_;

  /// Public testimonials of a company joined with their responses, newest
  /// publication first (unstamped rows first).
  fn list_published(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PublishedTestimonial>, Self::Error>> + Send + '_;
}
