//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use docket_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(Arc::new(store))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

async fn create(app: &Router, category: &str, number: &str) -> Value {
  let (status, body) = send(
    app,
    "POST",
    "/tickets",
    Some(json!({ "category": category, "number": number, "description": "first" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body
}

// ── Health ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_reports_ok() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "status": "ok" }));
}

// ── Tickets ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_duplicate_is_409() {
  let app = app().await;
  let ticket = create(&app, "VAC", "VAC-1").await;
  assert_eq!(ticket["version"], 1);
  assert_eq!(ticket["is_active"], true);

  let (status, body) = send(
    &app,
    "POST",
    "/tickets",
    Some(json!({ "category": "VAC", "number": "VAC-1", "description": "again" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("VAC/VAC-1"), "{body}");
}

#[tokio::test]
async fn create_without_number_generates_one() {
  let app = app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/tickets",
    Some(json!({ "category": "fitness", "description": "run" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let number = body["number"].as_str().unwrap();
  assert!(number.starts_with("FIT-"), "{number}");
  assert_eq!(number.split('-').count(), 3);
}

#[tokio::test]
async fn blank_description_is_400() {
  let app = app().await;
  let (status, _) = send(
    &app,
    "POST",
    "/tickets",
    Some(json!({ "category": "VAC", "number": "VAC-1", "description": "  " })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_and_read_history() {
  let app = app().await;
  create(&app, "FIT", "FIT-1").await;

  let (status, v2) = send(
    &app,
    "PATCH",
    "/tickets/FIT-1?category=FIT",
    Some(json!({ "description": "run 10k" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(v2["version"], 2);

  let (status, current) = send(&app, "GET", "/tickets/FIT-1", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(current["description"], "run 10k");

  let (status, history) = send(&app, "GET", "/tickets/FIT-1?include_history=true", None).await;
  assert_eq!(status, StatusCode::OK);
  let versions: Vec<_> = history.as_array().unwrap().iter().map(|t| t["version"].clone()).collect();
  assert_eq!(versions, [json!(2), json!(1)]);
}

#[tokio::test]
async fn null_clears_completion_criteria() {
  let app = app().await;
  let (status, _) = send(
    &app,
    "POST",
    "/tickets",
    Some(json!({
      "category": "FIT",
      "number": "FIT-2",
      "description": "run",
      "completion_criteria": "5k under 30 minutes",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, kept) = send(
    &app,
    "PATCH",
    "/tickets/FIT-2?category=FIT",
    Some(json!({ "description": "run further" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(kept["completion_criteria"], "5k under 30 minutes");

  let (status, cleared) = send(
    &app,
    "PATCH",
    "/tickets/FIT-2?category=FIT",
    Some(json!({ "completion_criteria": null })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(cleared["version"], 3);
  assert_eq!(cleared["completion_criteria"], Value::Null);
}

#[tokio::test]
async fn update_without_category_is_400() {
  let app = app().await;
  create(&app, "FIT", "FIT-1").await;
  let (status, _) = send(&app, "PATCH", "/tickets/FIT-1", Some(json!({ "description": "x" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_ticket_is_404() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/tickets/nope", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn soft_then_hard_delete() {
  let app = app().await;
  create(&app, "VAC", "VAC-1").await;

  let (status, soft) = send(&app, "DELETE", "/tickets/VAC-1?category=VAC", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(soft["mode"], "soft");
  assert_eq!(soft["ticket"]["is_active"], false);

  let (status, _) = send(&app, "GET", "/tickets/VAC-1", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, hard) = send(&app, "DELETE", "/tickets/VAC-1?mode=hard", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(hard, json!({ "mode": "hard", "removed": 1 }));
}

#[tokio::test]
async fn unknown_delete_mode_is_400() {
  let app = app().await;
  create(&app, "VAC", "VAC-1").await;
  let (status, _) = send(&app, "DELETE", "/tickets/VAC-1?mode=purge", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_reports_total_and_window() {
  let app = app().await;
  for n in ["A", "B", "C"] {
    create(&app, "VAC", n).await;
  }
  let (status, page) = send(&app, "GET", "/tickets?category=VAC&limit=2&offset=0", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["total"], 3);
  assert_eq!(page["items"].as_array().unwrap().len(), 2);

  let (status, _) = send(&app, "GET", "/tickets?limit=5000", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Todos ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn todo_lifecycle() {
  let app = app().await;
  create(&app, "VAC", "VAC-1").await;

  let (status, todo) = send(
    &app,
    "POST",
    "/tickets/VAC-1/todos",
    Some(json!({ "description": "pack" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = todo["id"].as_i64().unwrap();

  let (status, done) = send(&app, "PATCH", &format!("/todos/{id}"), Some(json!({ "done": true }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(done["done"], true);

  let (_, todos) = send(&app, "GET", "/tickets/VAC-1/todos", None).await;
  assert_eq!(todos.as_array().unwrap().len(), 1);

  let (status, _) = send(&app, "DELETE", &format!("/todos/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&app, "DELETE", &format!("/todos/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn todo_of_soft_deleted_ticket_is_404() {
  let app = app().await;
  create(&app, "VAC", "VAC-1").await;
  let (_, todo) = send(
    &app,
    "POST",
    "/tickets/VAC-1/todos",
    Some(json!({ "description": "pack" })),
  )
  .await;
  let id = todo["id"].as_i64().unwrap();
  send(&app, "DELETE", "/tickets/VAC-1?category=VAC", None).await;

  let (status, _) = send(&app, "PATCH", &format!("/todos/{id}"), Some(json!({ "done": true }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = send(&app, "DELETE", &format!("/todos/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn todo_on_missing_ticket_is_404() {
  let app = app().await;
  let (status, _) = send(
    &app,
    "POST",
    "/tickets/nope/todos",
    Some(json!({ "description": "pack" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
