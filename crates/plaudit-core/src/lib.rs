//! Core types, trait definitions and the testimonial pipeline for Plaudit.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! rerun pipeline and the auto-publish evaluator are written against the
//! [`store::TestimonialStore`] and [`workflow::Workflow`] traits; concrete
//! backends live in `plaudit-store-sqlite` and `plaudit-dify`.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod auto_publish;
pub mod company;
pub mod error;
pub mod payload;
pub mod rerun;
pub mod response;
pub mod schema;
pub mod store;
pub mod testimonial;
pub mod workflow;

pub use error::{AutoPublishError, BoxError, Error, RerunError, Result};

/// Minimum rating (on the 1–5 scale) at which a testimonial is auto-published.
pub const AUTO_PUBLISH_MIN_RATING: f64 = 4.0;
