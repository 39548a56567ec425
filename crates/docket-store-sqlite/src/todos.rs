//! [`TodoStore`] for [`SqliteStore`].

use docket_core::{
  store::TodoStore,
  ticket::TicketRef,
  todo::{NewTodo, TodoItem, TodoPatch},
};
use rusqlite::types::Value;

use crate::{
  Error, Result,
  encode::{RawTodo, encode_dt, now},
  executor::{execute, one, scalar},
  schema::TODO_COLUMNS,
  store::{SqliteStore, no_row, resolve_active, select_todos},
};

/// Items of a closed ticket version are frozen along with it.
const LIVE_PARENT: &str =
  "EXISTS (SELECT 1 FROM tickets WHERE tickets.id = todo_items.ticket_id AND tickets.is_active = 1)";

impl TodoStore for SqliteStore {
  type Error = Error;

  async fn add_todo(&self, ticket: TicketRef, input: NewTodo) -> Result<TodoItem> {
    input.validate()?;
    let at = encode_dt(now());
    let lookup = ticket.clone();

    let raw = self
      .exec
      .transaction(move |tx| {
        let Some(parent) = resolve_active(tx, &lookup)? else {
          return Err(Error::NotFound(lookup));
        };
        let position = match input.position {
          Some(position) => position,
          None => tx
            .run(
              &scalar::<i64>(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM todo_items WHERE ticket_id = ?1",
              )
              .bind(parent.id),
            )?
            .unwrap_or(0),
        };
        tx.run(
          &one::<RawTodo>(format!(
            "INSERT INTO todo_items (ticket_id, description, done, position, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?4, ?4)
             RETURNING {TODO_COLUMNS}"
          ))
          .bind(parent.id)
          .bind(input.description)
          .bind(position)
          .bind(at),
        )?
        .ok_or_else(|| no_row("INSERT INTO todo_items"))
      })
      .await
      .map_err(|e| e.during("add todo to", &ticket))?;

    let todo = raw.into_todo()?;
    tracing::debug!(ticket = %ticket, id = todo.id, "todo added");
    Ok(todo)
  }

  async fn list_todos(&self, ticket: TicketRef) -> Result<Vec<TodoItem>> {
    let lookup = ticket.clone();
    let raws = self
      .exec
      .snapshot(move |tx| {
        let Some(parent) = resolve_active(tx, &lookup)? else {
          return Err(Error::NotFound(lookup));
        };
        tx.run(&select_todos(parent.id))
      })
      .await
      .map_err(|e| e.during("list todos of", &ticket))?;

    raws.into_iter().map(RawTodo::into_todo).collect()
  }

  async fn update_todo(&self, id: i64, patch: TodoPatch) -> Result<TodoItem> {
    patch.validate()?;

    let mut sets: Vec<String> = Vec::new();
    let mut params: Vec<Value> = vec![Value::from(id)];
    if let Some(description) = patch.description {
      params.push(Value::from(description));
      sets.push(format!("description = ?{}", params.len()));
    }
    if let Some(done) = patch.done {
      params.push(Value::from(done));
      sets.push(format!("done = ?{}", params.len()));
    }
    if let Some(position) = patch.position {
      params.push(Value::from(position));
      sets.push(format!("position = ?{}", params.len()));
    }
    params.push(Value::from(encode_dt(now())));
    sets.push(format!("updated_at = ?{}", params.len()));

    let raw = self
      .exec
      .run(
        one::<RawTodo>(format!(
          "UPDATE todo_items SET {} WHERE id = ?1 AND {LIVE_PARENT} RETURNING {TODO_COLUMNS}",
          sets.join(", ")
        ))
        .bind_all(params),
      )
      .await
      .map_err(|e| e.during("update todo", id))?
      .ok_or(Error::TodoNotFound(id))?;

    raw.into_todo()
  }

  async fn delete_todo(&self, id: i64) -> Result<bool> {
    let removed = self
      .exec
      .run(execute(format!("DELETE FROM todo_items WHERE id = ?1 AND {LIVE_PARENT}")).bind(id))
      .await
      .map_err(|e| e.during("delete todo", id))?;
    Ok(removed > 0)
  }
}
