//! Router-level tests: every request goes through `api_router` via `oneshot`,
//! backed by an in-memory SQLite store and a canned workflow.

use std::sync::{Arc, Mutex};

use axum::{
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use plaudit_core::{
  company::{Company, Form, NewCompany},
  response::NewResponse,
  store::TestimonialStore,
  testimonial::{AiContent, Testimonial},
  workflow::{Workflow, WorkflowRequest},
};
use plaudit_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, api_router};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct CannedError(String);

struct CannedWorkflow {
  reply:    Result<Value, String>,
  requests: Mutex<Vec<WorkflowRequest>>,
}

impl CannedWorkflow {
  fn new(reply: Result<Value, String>) -> Self { Self { reply, requests: Mutex::new(Vec::new()) } }
}

impl Workflow for CannedWorkflow {
  type Error = CannedError;

  async fn run(&self, request: &WorkflowRequest) -> Result<Value, CannedError> {
    self.requests.lock().unwrap().push(request.clone());
    self.reply.clone().map_err(CannedError)
  }
}

fn generated(headline: &str) -> Result<Value, String> {
  let outputs = json!({ "ai_headline": headline, "ai_body": "body", "ai_bullets": ["one"] });
  Ok(json!({ "data": { "outputs": { "outputs": outputs.to_string() } } }))
}

type TestState = AppState<SqliteStore, CannedWorkflow>;

async fn make_state(reply: Result<Value, String>) -> TestState {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(Arc::new(store), Arc::new(CannedWorkflow::new(reply)))
}

/// A state whose form schemas are designed by a workflow answering `reply`.
async fn make_designing_state(reply: Result<Value, String>) -> (TestState, Arc<CannedWorkflow>) {
  let designer = Arc::new(CannedWorkflow::new(reply));
  let state = make_state(generated("H")).await.with_schema_workflow(designer.clone());
  (state, designer)
}

async fn seed(state: &TestState) -> (Company, Form) {
  state
    .store
    .create_company(NewCompany {
      name:         "Acme".into(),
      slug:         "acme".into(),
      iframe_token: Some("tok".into()),
      form_slug:    "acme-form".into(),
    })
    .await
    .unwrap()
}

async fn add_testimonial(state: &TestState, form: &Form, payload: Value) -> Testimonial {
  let response = state
    .store
    .insert_response(NewResponse { company_id: form.company_id, form_id: form.form_id, payload })
    .await
    .unwrap();
  state
    .store
    .upsert_testimonial(form.company_id, response.response_id)
    .await
    .unwrap()
}

async fn call(state: &TestState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = api_router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post(state: &TestState, uri: &str, body: Value) -> (StatusCode, Value) {
  call(state, Method::POST, uri, Some(body)).await
}

// ── Submit ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_generates_and_auto_publishes() {
  let state = make_state(generated("Loved it")).await;
  let (company, _) = seed(&state).await;
  state.store.set_auto_publish(company.company_id, true).await.unwrap();

  let (status, body) = post(
    &state,
    "/submit/acme-form",
    json!({ "name": " Aiko ", "rating": "5", "consent": "on", "comment": "great" }),
  )
  .await;

  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["rerun"]["publish"]["status"], json!("published"));
  assert_eq!(body["rerun"]["content"]["ai_headline"], json!("Loved it"));

  let id = body["testimonial_id"].as_str().unwrap().parse().unwrap();
  let stored = state.store.get_testimonial(id).await.unwrap().unwrap();
  assert!(stored.is_published());

  let response = state.store.get_response(stored.response_id).await.unwrap().unwrap();
  assert_eq!(
    response.payload,
    json!({ "name": "Aiko", "rating": 5, "consent": true, "comment": "great" })
  );
}

#[tokio::test]
async fn submit_succeeds_when_workflow_fails() {
  let state = make_state(Err("upstream down".into())).await;
  seed(&state).await;

  let (status, body) = post(
    &state,
    "/submit/acme-form",
    json!({ "name": "A", "rating": 5, "consent": true }),
  )
  .await;

  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["rerun"], Value::Null);
  let id = body["testimonial_id"].as_str().unwrap().parse().unwrap();
  let stored = state.store.get_testimonial(id).await.unwrap().unwrap();
  assert_eq!(stored.content, AiContent::default());
}

#[tokio::test]
async fn submit_rejects_invalid_answers() {
  let state = make_state(generated("H")).await;
  seed(&state).await;

  let (status, body) = post(
    &state,
    "/submit/acme-form",
    json!({ "name": "A", "rating": 9, "consent": true }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], json!("rating must be an integer from 1 to 5"));

  let (status, body) = post(&state, "/submit/acme-form", json!(["not", "an", "object"])).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], json!("invalid payload"));
}

#[tokio::test]
async fn submit_to_unknown_form_is_404() {
  let state = make_state(generated("H")).await;
  let (status, body) = post(
    &state,
    "/submit/missing",
    json!({ "name": "A", "rating": 5, "consent": true }),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], json!("form not found"));
}

// ── Rerun ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerun_returns_report() {
  let state = make_state(generated("Fresh")).await;
  let (_, form) = seed(&state).await;
  let t = add_testimonial(&state, &form, json!({ "name": "A", "rating": 2 })).await;

  let (status, body) = post(&state, &format!("/testimonials/{}/rerun", t.testimonial_id), json!({})).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["testimonial_id"], json!(t.testimonial_id.to_string()));
  assert_eq!(body["content"]["ai_bullets"], json!(["one"]));
  assert_eq!(body["publish"]["status"], json!("skipped"));
}

#[tokio::test]
async fn rerun_upstream_failure_is_500_with_upstream_message() {
  let state = make_state(Err("rate limited".into())).await;
  let (_, form) = seed(&state).await;
  let t = add_testimonial(&state, &form, json!({ "rating": 5 })).await;

  let (status, body) = post(&state, &format!("/testimonials/{}/rerun", t.testimonial_id), json!({})).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], json!("rate limited"));
}

#[tokio::test]
async fn rerun_unknown_or_malformed_id() {
  let state = make_state(generated("H")).await;

  let uri = format!("/testimonials/{}/rerun", uuid::Uuid::new_v4());
  let (status, _) = post(&state, &uri, json!({})).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = post(&state, "/testimonials/not-a-uuid/rerun", json!({})).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

// ── Toggle & edit ───────────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_publishes_then_unpublishes() {
  let state = make_state(generated("H")).await;
  let (_, form) = seed(&state).await;
  let t = add_testimonial(&state, &form, json!({ "rating": 1 })).await;
  let uri = format!("/testimonials/{}/toggle", t.testimonial_id);

  let (status, body) = call(&state, Method::POST, &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["is_public"], json!(true));
  assert!(body["published_at"].is_string());

  let (_, body) = call(&state, Method::POST, &uri, None).await;
  assert_eq!(body["is_public"], json!(false));
  assert_eq!(body["published_at"], Value::Null);
}

#[tokio::test]
async fn edit_trims_and_validates() {
  let state = make_state(generated("H")).await;
  let (_, form) = seed(&state).await;
  let t = add_testimonial(&state, &form, json!({ "rating": 5 })).await;
  let uri = format!("/testimonials/{}/edit", t.testimonial_id);

  let (status, body) = post(&state, &uri, json!({ "ai_headline": "  New  ", "ai_body": "Body" })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "ai_headline": "New", "ai_body": "Body" }));

  let (status, body) = post(&state, &uri, json!({ "ai_headline": " ", "ai_body": "Body" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], json!("invalid payload"));

  let missing = format!("/testimonials/{}/edit", uuid::Uuid::new_v4());
  let (status, _) = post(&state, &missing, json!({ "ai_headline": "a", "ai_body": "b" })).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Auto-publish ────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_endpoint_reports_each_outcome() {
  let state = make_state(generated("H")).await;
  let (company, form) = seed(&state).await;
  let uri = "/testimonials/auto-publish-high-rating";
  let body = json!({ "company_id": company.company_id });

  let (status, resp) = post(&state, uri, body.clone()).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(resp, json!({ "message": "公開対象となるクチコミがまだありません。", "updated": 0 }));

  add_testimonial(&state, &form, json!({ "rating": 3 })).await;
  let (_, resp) = post(&state, uri, body.clone()).await;
  assert_eq!(resp["message"], json!("☆4以上の新しい公開対象は見つかりませんでした。"));

  add_testimonial(&state, &form, json!({ "rating": 4 })).await;
  add_testimonial(&state, &form, json!({ "rating": "5" })).await;
  let (_, resp) = post(&state, uri, json!({ "companyId": company.company_id })).await;
  assert_eq!(resp, json!({ "message": "☆4以上の2件を公開しました。", "updated": 2 }));
}

#[tokio::test]
async fn batch_endpoint_rejects_bad_payload() {
  let state = make_state(generated("H")).await;
  let (status, body) = post(&state, "/testimonials/auto-publish-high-rating", json!({})).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], json!("invalid payload"));
}

#[tokio::test]
async fn setting_on_runs_batch_and_off_does_not() {
  let state = make_state(generated("H")).await;
  let (company, form) = seed(&state).await;
  add_testimonial(&state, &form, json!({ "rating": 5 })).await;
  let uri = "/companies/auto-publish-setting";

  let (status, resp) = post(&state, uri, json!({ "company_id": company.company_id, "enabled": true })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    resp,
    json!({ "message": "自動公開をオンにしました。☆4以上の1件を公開しました。", "updated": 1, "enabled": true })
  );
  let settings = state.store.company_settings(company.company_id).await.unwrap().unwrap();
  assert!(settings.auto_publish);

  let (_, resp) = post(&state, uri, json!({ "company_id": company.company_id, "enabled": false })).await;
  assert_eq!(resp, json!({ "message": "自動公開をオフにしました。", "updated": 0, "enabled": false }));

  let (status, _) = post(&state, uri, json!({ "company_id": uuid::Uuid::new_v4(), "enabled": true })).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Form schema ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn form_schema_assigns_unique_keys() {
  let state = make_state(generated("H")).await;
  let (company, _) = seed(&state).await;

  let (status, resp) = post(
    &state,
    "/companies/form-schema",
    json!({
      "company_id": company.company_id,
      "fields": [
        { "key": "name", "label": "お名前", "locked": true },
        { "key": "rating", "label": "総合評価", "type": "rating", "locked": true },
        { "label": "Favourite Dish" },
        { "label": "favourite dish", "required": true },
      ],
    }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(resp["ok"], json!(true));

  let keys: Vec<&str> = resp["schema"]["fields"]
    .as_array()
    .unwrap()
    .iter()
    .map(|f| f["key"].as_str().unwrap())
    .collect();
  assert_eq!(keys, vec!["name", "rating", "favourite_dish", "favourite_dish_2"]);

  let settings = state.store.company_settings(company.company_id).await.unwrap().unwrap();
  assert_eq!(settings.form_schema, Some(resp["schema"].clone()));
}

#[tokio::test]
async fn form_schema_requires_locked_fields() {
  let state = make_state(generated("H")).await;
  let (company, _) = seed(&state).await;

  let (status, body) = post(
    &state,
    "/companies/form-schema",
    json!({ "company_id": company.company_id, "fields": [{ "key": "name", "label": "お名前" }] }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], json!("missing required field: rating"));
}

#[tokio::test]
async fn form_schema_renames_repeated_locked_keys() {
  let state = make_state(generated("H")).await;
  let (company, _) = seed(&state).await;

  let (status, resp) = post(
    &state,
    "/companies/form-schema",
    json!({
      "company_id": company.company_id,
      "fields": [
        { "key": "name", "label": "A" },
        { "key": "name", "label": "B" },
        { "key": "rating", "label": "R" },
      ],
    }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let keys: Vec<&str> = resp["schema"]["fields"]
    .as_array()
    .unwrap()
    .iter()
    .map(|f| f["key"].as_str().unwrap())
    .collect();
  assert_eq!(keys, vec!["name", "name_2", "rating"]);
}

#[tokio::test]
async fn form_schema_stores_the_designed_schema() {
  let designed = json!({ "fields": [
    { "key": "name", "label": "お名前", "type": "text", "required": true },
    { "key": "rating", "label": "総合評価", "type": "rating", "required": true },
    { "key": "visit_reason", "label": "ご来店のきっかけ", "type": "text" },
  ]});
  let reply = json!({ "data": { "outputs": { "form_schema": designed.clone() } } });
  let (state, designer) = make_designing_state(Ok(reply)).await;
  let (company, _) = seed(&state).await;

  let (status, resp) = post(
    &state,
    "/companies/form-schema",
    json!({
      "companyId": company.company_id,
      "fields": [
        { "key": "name", "label": "お名前" },
        { "key": "rating", "label": "総合評価" },
        { "label": "Why did you visit?" },
      ],
    }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(resp["schema"], designed);

  let settings = state.store.company_settings(company.company_id).await.unwrap().unwrap();
  assert_eq!(settings.form_schema, Some(designed));

  let requests = designer.requests.lock().unwrap();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].inputs["company_id"], json!(company.company_id.to_string()));
  assert_eq!(requests[0].inputs["fields"][2]["key"], json!("why_did_you_visit"));
}

#[tokio::test]
async fn form_schema_rejects_unusable_designed_schema() {
  let reply = json!({ "data": { "outputs": { "form_schema": { "fields": [
    { "key": "name", "label": "お名前" },
    { "key": "name", "label": "もう一度" },
    { "key": "rating", "label": "評価" },
  ]}}}});
  let (state, _) = make_designing_state(Ok(reply)).await;
  let (company, _) = seed(&state).await;

  let (status, body) = post(
    &state,
    "/companies/form-schema",
    json!({
      "company_id": company.company_id,
      "fields": [{ "key": "name", "label": "お名前" }, { "key": "rating", "label": "評価" }],
    }),
  )
  .await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], json!("invalid schema from workflow: duplicate field key: name"));

  let settings = state.store.company_settings(company.company_id).await.unwrap().unwrap();
  assert_eq!(settings.form_schema, None);
}

#[tokio::test]
async fn form_schema_workflow_runs_after_validation() {
  let (state, designer) = make_designing_state(Err("schema app offline".into())).await;
  let (company, _) = seed(&state).await;

  let (status, body) = post(
    &state,
    "/companies/form-schema",
    json!({ "company_id": company.company_id, "fields": [{ "key": "name", "label": "n" }] }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], json!("missing required field: rating"));
  assert!(designer.requests.lock().unwrap().is_empty());

  let (status, body) = post(
    &state,
    "/companies/form-schema",
    json!({
      "company_id": company.company_id,
      "fields": [{ "key": "name", "label": "n" }, { "key": "rating", "label": "r" }],
    }),
  )
  .await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], json!("schema app offline"));
}

// ── Embed ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn embed_lists_public_testimonials_newest_first() {
  let state = make_state(generated("H")).await;
  let (_, form) = seed(&state).await;
  let old = add_testimonial(&state, &form, json!({ "name": "Old", "rating": 4 })).await;
  let new = add_testimonial(&state, &form, json!({ "name": "New", "rating": "5" })).await;
  add_testimonial(&state, &form, json!({ "name": "Hidden", "rating": 5 })).await;

  let now = Utc::now();
  state.store.set_visibility(old.testimonial_id, true, now - Duration::days(1)).await.unwrap();
  state.store.set_visibility(new.testimonial_id, true, now).await.unwrap();

  let (status, body) = call(&state, Method::GET, "/embed/acme?token=tok", None).await;
  assert_eq!(status, StatusCode::OK);
  let items = body.as_array().unwrap();
  assert_eq!(items.len(), 2);
  assert_eq!(items[0]["name"], json!("New"));
  assert_eq!(items[0]["rating"], json!(5.0));
  assert_eq!(items[0]["date"], json!(now.format("%Y-%m-%d").to_string()));
  assert_eq!(items[1]["name"], json!("Old"));
}

#[tokio::test]
async fn embed_requires_matching_token() {
  let state = make_state(generated("H")).await;
  seed(&state).await;

  for uri in ["/embed/acme?token=wrong", "/embed/acme", "/embed/other?token=tok"] {
    let (status, body) = call(&state, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    assert_eq!(body["error"], json!("not found"));
  }
}
