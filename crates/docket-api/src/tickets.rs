//! Handlers for `/tickets` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/tickets` | Body: `{"category":"…","description":"…"}`; `number` is generated when omitted |
//! | `GET`    | `/tickets` | `?category=&active_only=&include_todos=&limit=&offset=` |
//! | `GET`    | `/tickets/{number}` | `?category=&include_history=true` returns every version |
//! | `PATCH`  | `/tickets/{number}` | `?category=` required; body is a partial ticket |
//! | `DELETE` | `/tickets/{number}` | `?category=&mode=soft\|hard` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::Utc;
use docket_core::{
  lifecycle::{DeleteMode, Deletion},
  store::{Page, TicketQuery, TicketStore},
  ticket::{NewTicket, Ticket, TicketPatch, TicketRef, generate_number},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub category:            String,
  pub number:              Option<String>,
  pub description:         String,
  pub completion_criteria: Option<String>,
}

/// `POST /tickets`
pub async fn create<S: TicketStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let number = body.number.unwrap_or_else(|| generate_number(&body.category, Utc::now()));
  let mut input = NewTicket::new(body.category, number, body.description);
  input.completion_criteria = body.completion_criteria;

  let ticket = store.create(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(ticket)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub category:      Option<String>,
  pub active_only:   Option<bool>,
  pub include_todos: Option<bool>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

impl From<ListParams> for TicketQuery {
  fn from(params: ListParams) -> Self {
    let defaults = TicketQuery::default();
    TicketQuery {
      category:      params.category,
      active_only:   params.active_only.unwrap_or(defaults.active_only),
      include_todos: params.include_todos.unwrap_or(defaults.include_todos),
      limit:         params.limit.unwrap_or(defaults.limit),
      offset:        params.offset.unwrap_or(defaults.offset),
    }
  }
}

/// `GET /tickets`
pub async fn list<S: TicketStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Ticket>>, ApiError> {
  let page = store.list(params.into()).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GetParams {
  pub category:        Option<String>,
  #[serde(default)]
  pub include_history: bool,
}

/// `GET /tickets/{number}`
pub async fn get_one<S: TicketStore>(
  State(store): State<Arc<S>>,
  Path(number): Path<String>,
  Query(params): Query<GetParams>,
) -> Result<Response, ApiError> {
  let ticket = TicketRef::new(params.category, number);
  if params.include_history {
    let history = store.get_history(ticket).await.map_err(ApiError::store)?;
    return Ok(Json(history).into_response());
  }
  let current = store.get_current(ticket).await.map_err(ApiError::store)?;
  Ok(Json(current).into_response())
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
  pub category: Option<String>,
}

/// `PATCH /tickets/{number}?category=<category>`
pub async fn update<S: TicketStore>(
  State(store): State<Arc<S>>,
  Path(number): Path<String>,
  Query(params): Query<UpdateParams>,
  Json(patch): Json<TicketPatch>,
) -> Result<Json<Ticket>, ApiError> {
  let category = params
    .category
    .ok_or_else(|| ApiError::BadRequest("the category query parameter is required".into()))?;
  let ticket = store
    .update(category, number, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ticket))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
  pub category: Option<String>,
  pub mode:     Option<String>,
}

/// `DELETE /tickets/{number}[?mode=hard]`
pub async fn delete_one<S: TicketStore>(
  State(store): State<Arc<S>>,
  Path(number): Path<String>,
  Query(params): Query<DeleteParams>,
) -> Result<Json<Deletion>, ApiError> {
  let mode = params
    .mode
    .as_deref()
    .map(str::parse::<DeleteMode>)
    .transpose()
    .map_err(ApiError::store)?
    .unwrap_or_default();
  let deletion = store
    .delete(TicketRef::new(params.category, number), mode)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(deletion))
}
