//! [`SqliteStore`]: the SQLite implementation of [`TestimonialStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use plaudit_core::{
  company::{Company, CompanySettings, Form, NewCompany},
  payload::{payload_map, read_number},
  response::{NewResponse, Response},
  store::TestimonialStore,
  testimonial::{AiContent, PublishedTestimonial, Testimonial},
};

use crate::{
  Error, Result,
  encode::{
    COMPANY_COLUMNS, FORM_COLUMNS, RESPONSE_COLUMNS, RawCompany, RawForm, RawResponse,
    RawTestimonial, TESTIMONIAL_COLUMNS, decode_dt, decode_uuid, encode_bullets, encode_dt,
    encode_json, encode_uuid,
  },
  schema::SCHEMA,
};

/// Largest number of ids bound into a single `IN (…)` list. SQLite caps the
/// number of parameters per statement, so larger batches are split.
pub(crate) const ID_CHUNK: usize = 500;

/// `?1, ?2, …` placeholders for an `IN (…)` list, numbered from `first`.
fn placeholders(first: usize, count: usize) -> String {
  (first..first + count)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Plaudit store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run an `UPDATE … RETURNING <testimonial columns>` for a single row.
  async fn update_testimonial_returning(
    &self,
    sql: String,
    params: Vec<Option<String>>,
  ) -> Result<Option<Testimonial>> {
    let raw: Option<RawTestimonial> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), RawTestimonial::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTestimonial::into_testimonial).transpose()
  }
}

// ─── TestimonialStore impl ───────────────────────────────────────────────────

impl TestimonialStore for SqliteStore {
  type Error = Error;

  // ── Companies ─────────────────────────────────────────────────────────────

  async fn create_company(&self, input: NewCompany) -> Result<(Company, Form)> {
    let now = Utc::now();
    let company = Company {
      company_id:   Uuid::new_v4(),
      name:         input.name,
      slug:         input.slug,
      iframe_token: input.iframe_token,
      form_schema:  None,
      auto_publish: false,
      created_at:   now,
    };
    let form = Form {
      form_id:    Uuid::new_v4(),
      company_id: company.company_id,
      slug:       input.form_slug,
      created_at: now,
    };

    let company_id_str = encode_uuid(company.company_id);
    let form_id_str    = encode_uuid(form.form_id);
    let at_str         = encode_dt(now);
    let name           = company.name.clone();
    let slug           = company.slug.clone();
    let token          = company.iframe_token.clone();
    let form_slug      = form.slug.clone();
    let taken          = format!("{} / {}", company.slug, form.slug);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO companies (company_id, name, slug, iframe_token, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![company_id_str, name, slug, token, at_str],
        )?;
        tx.execute(
          "INSERT INTO forms (form_id, company_id, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![form_id_str, company_id_str, form_slug, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e| match e {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
          if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
          Error::SlugTaken(taken)
        }
        other => Error::Database(other),
      })?;

    Ok((company, form))
  }

  async fn get_company(&self, id: Uuid) -> Result<Option<Company>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCompany> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE company_id = ?1"),
              rusqlite::params![id_str],
              RawCompany::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCompany::into_company).transpose()
  }

  async fn company_settings(&self, id: Uuid) -> Result<Option<CompanySettings>> {
    Ok(self.get_company(id).await?.as_ref().map(CompanySettings::from))
  }

  async fn company_for_embed(&self, slug: &str, token: &str) -> Result<Option<Company>> {
    let slug  = slug.to_owned();
    let token = token.to_owned();

    let raw: Option<RawCompany> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE slug = ?1 AND iframe_token = ?2"
              ),
              rusqlite::params![slug, token],
              RawCompany::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCompany::into_company).transpose()
  }

  async fn set_auto_publish(&self, id: Uuid, enabled: bool) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE companies SET auto_publish_high_rating = ?2 WHERE company_id = ?1",
          rusqlite::params![id_str, enabled],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn set_form_schema(&self, id: Uuid, schema: serde_json::Value) -> Result<bool> {
    let id_str     = encode_uuid(id);
    let schema_str = encode_json(&schema)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE companies SET form_schema = ?2 WHERE company_id = ?1",
          rusqlite::params![id_str, schema_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Forms ─────────────────────────────────────────────────────────────────

  async fn form_by_slug(&self, slug: &str) -> Result<Option<Form>> {
    let slug = slug.to_owned();

    let raw: Option<RawForm> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FORM_COLUMNS} FROM forms WHERE slug = ?1"),
              rusqlite::params![slug],
              RawForm::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawForm::into_form).transpose()
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  async fn insert_response(&self, input: NewResponse) -> Result<Response> {
    let response = Response {
      response_id: Uuid::new_v4(),
      company_id:  input.company_id,
      form_id:     input.form_id,
      payload:     input.payload,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(response.response_id);
    let company_str = encode_uuid(response.company_id);
    let form_str    = encode_uuid(response.form_id);
    let payload_str = encode_json(&response.payload)?;
    let at_str      = encode_dt(response.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO responses (response_id, company_id, form_id, payload, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, company_str, form_str, payload_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(response)
  }

  async fn get_response(&self, id: Uuid) -> Result<Option<Response>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawResponse> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE response_id = ?1"),
              rusqlite::params![id_str],
              RawResponse::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResponse::into_response).transpose()
  }

  async fn response_ratings(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, f64>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }

    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut rows = Vec::with_capacity(id_strs.len());
        for chunk in id_strs.chunks(ID_CHUNK) {
          let mut stmt = conn.prepare_cached(&format!(
            "SELECT response_id, payload FROM responses WHERE response_id IN ({})",
            placeholders(1, chunk.len())
          ))?;
          let found = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?;
          for row in found {
            rows.push(row?);
          }
        }
        Ok(rows)
      })
      .await?;

    let mut ratings = HashMap::with_capacity(rows.len());
    for (id, payload) in rows {
      let payload = serde_json::from_str(&payload).unwrap_or_default();
      if let Some(rating) = read_number(&payload_map(&payload), "rating") {
        ratings.insert(decode_uuid(&id)?, rating);
      }
    }
    Ok(ratings)
  }

  // ── Testimonials ──────────────────────────────────────────────────────────

  async fn upsert_testimonial(&self, company_id: Uuid, response_id: Uuid) -> Result<Testimonial> {
    let id_str       = encode_uuid(Uuid::new_v4());
    let company_str  = encode_uuid(company_id);
    let response_str = encode_uuid(response_id);
    let at_str       = encode_dt(Utc::now());

    let raw: RawTestimonial = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO testimonials (testimonial_id, company_id, response_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (response_id) DO UPDATE SET response_id = testimonials.response_id
             RETURNING {TESTIMONIAL_COLUMNS}"
          ),
          rusqlite::params![id_str, company_str, response_str, at_str],
          RawTestimonial::from_row,
        )?)
      })
      .await?;

    raw.into_testimonial()
  }

  async fn get_testimonial(&self, id: Uuid) -> Result<Option<Testimonial>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTestimonial> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {TESTIMONIAL_COLUMNS} FROM testimonials WHERE testimonial_id = ?1"
              ),
              rusqlite::params![id_str],
              RawTestimonial::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTestimonial::into_testimonial).transpose()
  }

  async fn list_testimonials(&self, company_id: Uuid) -> Result<Vec<Testimonial>> {
    let company_str = encode_uuid(company_id);

    let raws: Vec<RawTestimonial> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TESTIMONIAL_COLUMNS} FROM testimonials
           WHERE company_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![company_str], RawTestimonial::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTestimonial::into_testimonial).collect()
  }

  async fn save_ai_content(&self, id: Uuid, content: &AiContent) -> Result<bool> {
    let id_str      = encode_uuid(id);
    let headline    = content.ai_headline.clone();
    let body        = content.ai_body.clone();
    let bullets_str = encode_bullets(&content.ai_bullets)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE testimonials SET ai_headline = ?2, ai_body = ?3, ai_bullets = ?4
           WHERE testimonial_id = ?1",
          rusqlite::params![id_str, headline, body, bullets_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn edit_ai_text(&self, id: Uuid, headline: &str, body: &str) -> Result<Option<Testimonial>> {
    self
      .update_testimonial_returning(
        format!(
          "UPDATE testimonials SET ai_headline = ?2, ai_body = ?3
           WHERE testimonial_id = ?1
           RETURNING {TESTIMONIAL_COLUMNS}"
        ),
        vec![Some(encode_uuid(id)), Some(headline.to_owned()), Some(body.to_owned())],
      )
      .await
  }

  async fn publish_testimonial(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    Ok(self.publish_testimonials(&[id], at).await? > 0)
  }

  async fn publish_testimonials(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }

    let at_str  = encode_dt(at);
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changed = 0;
        for chunk in id_strs.chunks(ID_CHUNK) {
          let sql = format!(
            "UPDATE testimonials SET is_public = 1, published_at = ?1
             WHERE testimonial_id IN ({}) AND is_public IS NOT 1",
            placeholders(2, chunk.len())
          );
          let params = std::iter::once(&at_str).chain(chunk.iter());
          changed += tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    Ok(changed)
  }

  async fn set_visibility(
    &self,
    id: Uuid,
    is_public: bool,
    at: DateTime<Utc>,
  ) -> Result<Option<Testimonial>> {
    let published_at = is_public.then(|| encode_dt(at));
    self
      .update_testimonial_returning(
        format!(
          "UPDATE testimonials SET is_public = CAST(?2 AS INTEGER), published_at = ?3
           WHERE testimonial_id = ?1
           RETURNING {TESTIMONIAL_COLUMNS}"
        ),
        vec![Some(encode_uuid(id)), Some(u8::from(is_public).to_string()), published_at],
      )
      .await
  }

  async fn list_published(&self, company_id: Uuid) -> Result<Vec<PublishedTestimonial>> {
    let company_str = encode_uuid(company_id);

    let rows: Vec<(RawTestimonial, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             t.testimonial_id, t.company_id, t.response_id, t.is_public,
             t.published_at, t.ai_headline, t.ai_body, t.ai_bullets, t.created_at,
             r.payload, r.created_at
           FROM testimonials t
           JOIN responses r ON r.response_id = t.response_id
           WHERE t.company_id = ?1 AND t.is_public = 1
           ORDER BY t.published_at IS NOT NULL, t.published_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![company_str], |row| {
            Ok((RawTestimonial::from_row(row)?, row.get(9)?, row.get(10)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(raw, payload, created_at)| {
        Ok(PublishedTestimonial {
          testimonial:         raw.into_testimonial()?,
          response_payload:    serde_json::from_str(&payload).unwrap_or_default(),
          response_created_at: decode_dt(&created_at)?,
        })
      })
      .collect()
  }
}
