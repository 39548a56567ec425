//! Handlers for todo items.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/tickets/{number}/todos` | Items of the active version |
//! | `POST`   | `/tickets/{number}/todos` | Body: `{"description":"…","position":3}` |
//! | `PATCH`  | `/todos/{id}` | Body: any of `description`, `done`, `position` |
//! | `DELETE` | `/todos/{id}` | 204, or 404 if no such item |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use docket_core::{
  store::TodoStore,
  ticket::TicketRef,
  todo::{NewTodo, TodoItem, TodoPatch},
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TicketParams {
  pub category: Option<String>,
}

/// `GET /tickets/{number}/todos`
pub async fn list<S: TodoStore>(
  State(store): State<Arc<S>>,
  Path(number): Path<String>,
  Query(params): Query<TicketParams>,
) -> Result<Json<Vec<TodoItem>>, ApiError> {
  let todos = store
    .list_todos(TicketRef::new(params.category, number))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(todos))
}

/// `POST /tickets/{number}/todos`
pub async fn create<S: TodoStore>(
  State(store): State<Arc<S>>,
  Path(number): Path<String>,
  Query(params): Query<TicketParams>,
  Json(body): Json<NewTodo>,
) -> Result<impl IntoResponse, ApiError> {
  let todo = store
    .add_todo(TicketRef::new(params.category, number), body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(todo)))
}

/// `PATCH /todos/{id}`
pub async fn update<S: TodoStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(patch): Json<TodoPatch>,
) -> Result<Json<TodoItem>, ApiError> {
  let todo = store.update_todo(id, patch).await.map_err(ApiError::store)?;
  Ok(Json(todo))
}

/// `DELETE /todos/{id}`
pub async fn delete_one<S: TodoStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
  if store.delete_todo(id).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("todo item {id} not found")))
  }
}
