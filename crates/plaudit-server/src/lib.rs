//! Process bootstrap for Plaudit: configuration and the top-level router.
//!
//! The binary in `main.rs` loads a [`ServerConfig`], opens the store, builds
//! the workflow client and serves [`router`].

use std::path::{Path, PathBuf};

use axum::Router;
use plaudit_api::AppState;
use plaudit_core::{store::TestimonialStore, workflow::Workflow};
use plaudit_dify::DifyConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_dify_base_url() -> String { "https://api.dify.ai".to_owned() }

fn default_dify_timeout_secs() -> u64 { 30 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `PLAUDIT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  pub store_path:        PathBuf,
  #[serde(default = "default_dify_base_url")]
  pub dify_base_url:     String,
  /// Empty only for helper modes that never call the workflow.
  #[serde(default)]
  pub dify_api_key:      String,
  /// Key of the form-schema design workflow. Schemas are stored as the
  /// editor sends them when unset.
  #[serde(default)]
  pub dify_form_api_key: Option<String>,
  #[serde(default = "default_dify_timeout_secs")]
  pub dify_timeout_secs: u64,
}

impl ServerConfig {
  /// Layer the optional file at `path` under the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("PLAUDIT"))
      .build()?
      .try_deserialize()
  }

  pub fn dify(&self) -> DifyConfig {
    DifyConfig {
      base_url:     self.dify_base_url.clone(),
      api_key:      self.dify_api_key.clone(),
      timeout_secs: self.dify_timeout_secs,
    }
  }

  /// The form-schema workflow: same service, its own key.
  pub fn dify_form(&self) -> Option<DifyConfig> {
    let api_key = self.dify_form_api_key.as_deref().filter(|k| !k.trim().is_empty())?;
    Some(DifyConfig { api_key: api_key.to_owned(), ..self.dify() })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the top-level router: the JSON API under `/api`, with request
/// tracing.
pub fn router<S, W>(state: AppState<S, W>) -> Router
where
  S: TestimonialStore + 'static,
  W: Workflow + 'static,
{
  Router::new()
    .nest("/api", plaudit_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    Json,
    body::Body,
    http::{Method, Request, StatusCode, header},
    routing::post,
  };
  use plaudit_core::company::NewCompany;
  use plaudit_dify::DifyClient;
  use plaudit_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("plaudit-{name}-{}.toml", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn config_defaults_apply() {
    let path = write_config(
      "defaults",
      r#"
        store_path   = "~/plaudit.db"
        dify_api_key = "app-123"
      "#,
    );
    let cfg = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.dify_base_url, "https://api.dify.ai");
    assert_eq!(cfg.dify_timeout_secs, 30);
    assert_eq!(cfg.dify().api_key, "app-123");
    assert!(cfg.dify_form().is_none());
  }

  #[test]
  fn form_workflow_shares_service_with_its_own_key() {
    let path = write_config(
      "form-key",
      r#"
        store_path        = "/tmp/plaudit.db"
        dify_base_url     = "http://dify.internal"
        dify_api_key      = "app-testimonials"
        dify_form_api_key = "app-forms"
      "#,
    );
    let cfg = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let form = cfg.dify_form().unwrap();
    assert_eq!(form.api_key, "app-forms");
    assert_eq!(form.base_url, "http://dify.internal");
    assert_eq!(cfg.dify().api_key, "app-testimonials");

    let blank = ServerConfig { dify_form_api_key: Some("  ".into()), ..cfg };
    assert!(blank.dify_form().is_none());
  }

  #[test]
  fn config_file_overrides_defaults() {
    let path = write_config(
      "overrides",
      r#"
        host              = "0.0.0.0"
        port              = 9000
        store_path        = "/var/lib/plaudit.db"
        dify_base_url     = "http://dify.internal"
        dify_api_key      = "app-456"
        dify_timeout_secs = 5
      "#,
    );
    let cfg = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/plaudit.db"));
    assert_eq!(cfg.dify().base_url, "http://dify.internal");
    assert_eq!(cfg.dify().timeout_secs, 5);
  }

  #[test]
  fn config_without_store_path_is_rejected() {
    let path = write_config("missing", r#"dify_api_key = "app-789""#);
    let result = ServerConfig::load(&path);
    std::fs::remove_file(&path).ok();
    assert!(result.is_err());
  }

  /// A stand-in for the Dify service that always generates the same copy.
  async fn spawn_dify() -> String {
    let outputs = json!({ "ai_headline": "最高の体験", "ai_body": "本文", "ai_bullets": ["速い"] });
    let envelope = json!({ "data": { "outputs": { "outputs": outputs.to_string() } } });
    let app = Router::new().route(
      "/v1/workflows/run",
      post(move || {
        let envelope = envelope.clone();
        async move { Json(envelope) }
      }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
  }

  async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  #[tokio::test]
  async fn submission_flows_through_to_the_widget() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (company, _) = store
      .create_company(NewCompany {
        name:         "Acme".into(),
        slug:         "acme".into(),
        iframe_token: Some("tok".into()),
        form_slug:    "acme-form".into(),
      })
      .await
      .unwrap();
    store.set_auto_publish(company.company_id, true).await.unwrap();

    let dify = DifyClient::new(DifyConfig {
      base_url:     spawn_dify().await,
      api_key:      "app-test".into(),
      timeout_secs: 5,
    })
    .unwrap();
    let app = router(AppState::new(Arc::new(store), Arc::new(dify)));

    let (status, body) = send(
      &app,
      Method::POST,
      "/api/submit/acme-form",
      Some(json!({ "name": "Aiko", "rating": 5, "consent": "on" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rerun"]["publish"]["status"], json!("published"));

    let (status, body) = send(&app, Method::GET, "/api/embed/acme?token=tok", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body[0],
      json!({
        "id": body[0]["id"],
        "title": "最高の体験",
        "body": "本文",
        "bullets": ["速い"],
        "name": "Aiko",
        "rating": 5.0,
        "date": body[0]["date"],
      })
    );
  }

  #[tokio::test]
  async fn routes_outside_api_are_not_found() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let dify = DifyClient::new(DifyConfig {
      base_url:     "http://127.0.0.1:9".into(),
      api_key:      String::new(),
      timeout_secs: 1,
    })
    .unwrap();
    let app = router(AppState::new(Arc::new(store), Arc::new(dify)));

    let (status, _) = send(&app, Method::GET, "/embed/acme?token=tok", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
