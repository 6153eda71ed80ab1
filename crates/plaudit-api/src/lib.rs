//! JSON REST API for Plaudit.
//!
//! Exposes an axum [`Router`] backed by any [`TestimonialStore`] and
//! [`Workflow`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", plaudit_api::api_router(AppState::new(store, workflow)))
//! ```

pub mod companies;
pub mod embed;
pub mod error;
pub mod submit;
pub mod testimonials;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use plaudit_core::{store::TestimonialStore, workflow::Workflow};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct AppState<S, W> {
  pub store:           Arc<S>,
  /// Generates testimonial copy.
  pub workflow:        Arc<W>,
  /// Designs form schemas; when absent the editor's fields are stored as
  /// prepared.
  pub schema_workflow: Option<Arc<W>>,
}

impl<S, W> AppState<S, W> {
  pub fn new(store: Arc<S>, workflow: Arc<W>) -> Self {
    Self { store, workflow, schema_workflow: None }
  }

  pub fn with_schema_workflow(mut self, workflow: Arc<W>) -> Self {
    self.schema_workflow = Some(workflow);
    self
  }
}

impl<S, W> Clone for AppState<S, W> {
  fn clone(&self) -> Self {
    Self {
      store:           self.store.clone(),
      workflow:        self.workflow.clone(),
      schema_workflow: self.schema_workflow.clone(),
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, W>(state: AppState<S, W>) -> Router<()>
where
  S: TestimonialStore + 'static,
  W: Workflow + 'static,
{
  Router::new()
    // Testimonials
    .route("/testimonials/{id}/rerun", post(testimonials::rerun::<S, W>))
    .route("/testimonials/{id}/toggle", post(testimonials::toggle::<S, W>))
    .route("/testimonials/{id}/edit", post(testimonials::edit::<S, W>))
    .route(
      "/testimonials/auto-publish-high-rating",
      post(testimonials::auto_publish::<S, W>),
    )
    // Companies
    .route(
      "/companies/auto-publish-setting",
      post(companies::auto_publish_setting::<S, W>),
    )
    .route("/companies/form-schema", post(companies::form_schema::<S, W>))
    // Public surfaces
    .route("/submit/{form_slug}", post(submit::submit::<S, W>))
    .route("/embed/{company_slug}", get(embed::list::<S, W>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
