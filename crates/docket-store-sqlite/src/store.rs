//! SQLite implementation of [`TicketStore`]: [`SqliteStore`].
//!
//! Every write runs inside one `BEGIN IMMEDIATE` transaction, which holds the
//! database write lock across the "is there an active version?" check and the
//! write that depends on it. The partial unique index on active rows backs
//! this up at the schema level.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use docket_core::{
  lifecycle::{DeleteMode, Deletion},
  store::{Page, TicketQuery, TicketStore},
  ticket::{LogicalKey, NewTicket, Payload, Ticket, TicketPatch, TicketRef},
};
use rusqlite::types::Value;

use crate::{
  Error, Result,
  encode::{RawTicket, RawTodo, decode_dt, encode_dt, now},
  executor::{Executor, Statement, Tx, execute, one, rows, scalar},
  pool::{Pool, PoolConfig},
  schema::{SCHEMA, TICKET_COLUMNS, TODO_COLUMNS},
  shape::{Affected, OneRow, Rows},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A versioned ticket store backed by SQLite.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) exec: Executor,
}

impl SqliteStore {
  /// Build a store over `pool`, opening a first connection and applying the
  /// schema.
  pub async fn new(pool: Pool) -> Result<Self> {
    let store = Self { exec: Executor::new(pool) };
    store.exec.connect().await?;
    store.init_schema().await?;
    Ok(store)
  }

  /// Open (or create) the database described by `config`.
  pub async fn open(config: PoolConfig) -> Result<Self> { Self::new(Pool::new(config)).await }

  /// Open a private in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> { Self::open(PoolConfig::in_memory()).await }

  pub fn executor(&self) -> &Executor { &self.exec }

  /// Release every pooled connection. An in-memory store is unusable
  /// afterwards; a file store reconnects on its next call.
  pub async fn close(&self) -> Result<()> { self.exec.close().await }

  async fn init_schema(&self) -> Result<()> { self.exec.run_script(SCHEMA).await }

  async fn close_active(&self, ticket: TicketRef) -> Result<Ticket> {
    let at = now();
    let lookup = ticket.clone();
    let (raw, todos) = self
      .exec
      .transaction(move |tx| {
        let Some(current) = resolve_active(tx, &lookup)? else {
          return Err(Error::NotFound(lookup));
        };
        let closed_at = at.max(decode_dt(&current.valid_from)?);
        let closed = tx
          .run(&close_returning(current.id, closed_at))?
          .ok_or_else(|| Error::NotFound(lookup.clone()))?;
        let todos = tx.run(&select_todos(closed.id))?;
        Ok((closed, todos))
      })
      .await
      .map_err(|e| e.during("soft delete", &ticket))?;

    let closed = assemble(raw, todos).map_err(|e| e.during("soft delete", &ticket))?;
    tracing::info!(key = %closed.key(), version = closed.version, "ticket closed");
    Ok(closed)
  }

  async fn purge(&self, ticket: TicketRef) -> Result<usize> {
    let (filter, params) = match_ref(&ticket);
    let removed = self
      .exec
      .run(execute(format!("DELETE FROM tickets WHERE {filter}")).bind_all(params))
      .await
      .map_err(|e| e.during("hard delete", &ticket))?;
    tracing::warn!(ticket = %ticket, removed, "hard-deleted every version");
    Ok(removed)
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────

/// `WHERE` fragment and parameters selecting every row of `ticket`.
pub(crate) fn match_ref(ticket: &TicketRef) -> (&'static str, Vec<Value>) {
  let mut params = vec![Value::from(ticket.number.clone())];
  match &ticket.category {
    Some(category) => {
      params.push(Value::from(category.clone()));
      ("ticket_number = ?1 AND ticket_category = ?2", params)
    }
    None => ("ticket_number = ?1", params),
  }
}

/// The active row for `ticket`, if any.
///
/// Two active rows in one category are an integrity violation. Without a
/// category, active rows in several categories make the reference ambiguous.
pub(crate) fn resolve_active(tx: &Tx<'_>, ticket: &TicketRef) -> Result<Option<RawTicket>> {
  let (filter, params) = match_ref(ticket);
  let mut found = tx.run(
    &rows::<RawTicket>(format!(
      "SELECT {TICKET_COLUMNS} FROM tickets WHERE {filter} AND is_active = 1 ORDER BY id"
    ))
    .bind_all(params),
  )?;
  if found.len() <= 1 {
    return Ok(found.pop());
  }

  let mut categories: Vec<&str> = found.iter().map(|r| r.category.as_str()).collect();
  categories.sort_unstable();
  if let Some(duplicate) = categories.windows(2).find(|w| w[0] == w[1]).map(|w| w[0]) {
    let active = categories.iter().filter(|c| **c == duplicate).count();
    let key = LogicalKey::new(duplicate, &ticket.number);
    tracing::error!(key = %key, active, "more than one active version");
    return Err(Error::IntegrityViolation { key, active });
  }
  Err(Error::Validation(format!(
    "ticket number {} is active in {} categories; specify a category",
    ticket.number,
    found.len()
  )))
}

fn insert_version(
  payload: &Payload,
  number: &str,
  version: u32,
  at: DateTime<Utc>,
) -> Statement<OneRow<RawTicket>> {
  one::<RawTicket>(format!(
    "INSERT INTO tickets (
       ticket_category, ticket_number, description, completion_criteria,
       version, valid_from, valid_to, is_active, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 1, ?6, ?6)
     RETURNING {TICKET_COLUMNS}"
  ))
  .bind(payload.category.clone())
  .bind(number.to_owned())
  .bind(payload.description.clone())
  .bind(payload.completion_criteria.clone())
  .bind(version)
  .bind(encode_dt(at))
}

fn close_version(id: i64, at: DateTime<Utc>) -> Statement<Affected> {
  execute(
    "UPDATE tickets SET valid_to = ?2, is_active = 0, updated_at = ?2
     WHERE id = ?1 AND is_active = 1",
  )
  .bind(id)
  .bind(encode_dt(at))
}

fn close_returning(id: i64, at: DateTime<Utc>) -> Statement<OneRow<RawTicket>> {
  one::<RawTicket>(format!(
    "UPDATE tickets SET valid_to = ?2, is_active = 0, updated_at = ?2
     WHERE id = ?1 AND is_active = 1
     RETURNING {TICKET_COLUMNS}"
  ))
  .bind(id)
  .bind(encode_dt(at))
}

pub(crate) fn select_todos(ticket_id: i64) -> Statement<Rows<RawTodo>> {
  rows::<RawTodo>(format!(
    "SELECT {TODO_COLUMNS} FROM todo_items WHERE ticket_id = ?1 ORDER BY position, id"
  ))
  .bind(ticket_id)
}

fn select_todos_for(ticket_ids: &[i64]) -> Statement<Rows<RawTodo>> {
  let placeholders = (1..=ticket_ids.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
  rows::<RawTodo>(format!(
    "SELECT {TODO_COLUMNS} FROM todo_items WHERE ticket_id IN ({placeholders})
     ORDER BY ticket_id, position, id"
  ))
  .bind_all(ticket_ids.iter().map(|id| Value::from(*id)))
}

pub(crate) fn no_row(statement: &str) -> Error {
  Error::Decode(format!("{statement} returned no row"))
}

/// Decode a ticket row and attach its todo items.
fn assemble(raw: RawTicket, todos: Vec<RawTodo>) -> Result<Ticket> {
  let mut ticket = raw.into_ticket()?;
  ticket.todo_items = todos.into_iter().map(RawTodo::into_todo).collect::<Result<_>>()?;
  Ok(ticket)
}

/// What an update did inside its transaction.
enum Revision {
  Unchanged { current: Ticket, todos: Vec<RawTodo> },
  Replaced { previous: u32, row: RawTicket, todos: Vec<RawTodo> },
}

// ─── TicketStore impl ────────────────────────────────────────────────────────

impl TicketStore for SqliteStore {
  type Error = Error;

  async fn create(&self, input: NewTicket) -> Result<Ticket> {
    input.validate()?;
    let key = input.key();
    let at = now();
    let payload = Payload {
      category:            input.category,
      description:         input.description,
      completion_criteria: input.completion_criteria,
    };

    let raw = self
      .exec
      .transaction({
        let key = key.clone();
        move |tx| {
          if resolve_active(tx, &TicketRef::exact(&key))?.is_some() {
            return Err(Error::Conflict(key));
          }
          tx.run(&insert_version(&payload, &key.number, 1, at))?
            .ok_or_else(|| no_row("INSERT INTO tickets"))
        }
      })
      .await
      .map_err(|e| {
        if e.is_unique_violation() { Error::Conflict(key.clone()) } else { e.during("create", &key) }
      })?;

    let ticket = raw.into_ticket().map_err(|e| e.during("create", &key))?;
    tracing::info!(key = %key, id = ticket.id, "ticket created");
    Ok(ticket)
  }

  async fn get_current(&self, ticket: TicketRef) -> Result<Ticket> {
    let lookup = ticket.clone();
    let (raw, todos) = self
      .exec
      .snapshot(move |tx| {
        let Some(raw) = resolve_active(tx, &lookup)? else {
          return Err(Error::NotFound(lookup));
        };
        let todos = tx.run(&select_todos(raw.id))?;
        Ok((raw, todos))
      })
      .await
      .map_err(|e| e.during("get", &ticket))?;

    assemble(raw, todos).map_err(|e| e.during("get", &ticket))
  }

  async fn get_history(&self, ticket: TicketRef) -> Result<Vec<Ticket>> {
    let (filter, params) = match_ref(&ticket);
    let raws = self
      .exec
      .run(
        rows::<RawTicket>(format!(
          "SELECT {TICKET_COLUMNS} FROM tickets WHERE {filter} ORDER BY id DESC"
        ))
        .bind_all(params),
      )
      .await
      .map_err(|e| e.during("get history of", &ticket))?;

    raws
      .into_iter()
      .map(RawTicket::into_ticket)
      .collect::<Result<_>>()
      .map_err(|e| e.during("get history of", &ticket))
  }

  async fn list(&self, query: TicketQuery) -> Result<Page<Ticket>> {
    query.validate()?;

    // Filter parameters are shared by both statements; the page parameters
    // are appended to the page statement only.
    let mut conditions: Vec<String> = Vec::new();
    let mut filter_params: Vec<Value> = Vec::new();
    if query.active_only {
      conditions.push("is_active = 1".to_owned());
    }
    if let Some(category) = &query.category {
      filter_params.push(Value::from(category.clone()));
      conditions.push(format!("ticket_category = ?{}", filter_params.len()));
    }
    let where_clause = if conditions.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conditions.join(" AND "))
    };

    let n = filter_params.len();
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
    let page = rows::<RawTicket>(format!(
      "SELECT {TICKET_COLUMNS} FROM tickets {where_clause}
       ORDER BY updated_at DESC, id DESC
       LIMIT ?{} OFFSET ?{}",
      n + 1,
      n + 2
    ))
    .bind_all(filter_params.iter().cloned())
    .bind(limit)
    .bind(offset);
    let count = scalar::<i64>(format!("SELECT COUNT(*) FROM tickets {where_clause}"))
      .bind_all(filter_params);

    let include_todos = query.include_todos;
    let (raws, total, todos) = self
      .exec
      .snapshot(move |tx| {
        let raws = tx.run(&page)?;
        let total = tx.run(&count)?.unwrap_or(0);
        let todos = if include_todos && !raws.is_empty() {
          let ids: Vec<i64> = raws.iter().map(|r| r.id).collect();
          tx.run(&select_todos_for(&ids))?
        } else {
          Vec::new()
        };
        Ok((raws, total, todos))
      })
      .await
      .map_err(|e| e.during("list", query.category.as_deref().unwrap_or("*")))?;

    let mut by_ticket: HashMap<i64, Vec<RawTodo>> = HashMap::new();
    for todo in todos {
      by_ticket.entry(todo.ticket_id).or_default().push(todo);
    }
    let items = raws
      .into_iter()
      .map(|raw| {
        let todos = by_ticket.remove(&raw.id).unwrap_or_default();
        assemble(raw, todos)
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Page {
      items,
      total: u64::try_from(total).unwrap_or(0),
      limit: query.limit,
      offset: query.offset,
    })
  }

  async fn update(&self, category: String, number: String, patch: TicketPatch) -> Result<Ticket> {
    patch.validate()?;
    let key = LogicalKey::new(category, number);
    let at = now();

    let revision = self
      .exec
      .transaction({
        let key = key.clone();
        move |tx| {
          let Some(row) = resolve_active(tx, &TicketRef::exact(&key))? else {
            return Err(Error::NotFound(TicketRef::exact(&key)));
          };
          let current = row.into_ticket()?;
          let merged = patch.merge(&current);

          if merged == Payload::of(&current) {
            let todos = tx.run(&select_todos(current.id))?;
            return Ok(Revision::Unchanged { current, todos });
          }

          if merged.category != key.category {
            let target = LogicalKey::new(merged.category.clone(), key.number.clone());
            if resolve_active(tx, &TicketRef::exact(&target))?.is_some() {
              return Err(Error::Conflict(target));
            }
            // Versions carry on from the moved lineage, so they must not
            // interleave with rows already filed under the target key.
            let existing = tx
              .run(
                &scalar::<i64>(
                  "SELECT COUNT(*) FROM tickets WHERE ticket_category = ?1 AND ticket_number = ?2",
                )
                .bind(target.category.clone())
                .bind(target.number.clone()),
              )?
              .unwrap_or(0);
            if existing > 0 {
              return Err(Error::Occupied(target));
            }
          }

          // The new version starts exactly where the old one ends.
          let switch_at = at.max(current.valid_from);
          if tx.run(&close_version(current.id, switch_at))? != 1 {
            return Err(Error::NotFound(TicketRef::exact(&key)));
          }
          let row = tx
            .run(&insert_version(&merged, &key.number, current.version + 1, switch_at))?
            .ok_or_else(|| no_row("INSERT INTO tickets"))?;
          tx.run(
            &execute("UPDATE todo_items SET ticket_id = ?1 WHERE ticket_id = ?2")
              .bind(row.id)
              .bind(current.id),
          )?;
          let todos = tx.run(&select_todos(row.id))?;
          Ok(Revision::Replaced { previous: current.version, row, todos })
        }
      })
      .await
      .map_err(|e| e.during("update", &key))?;

    match revision {
      Revision::Unchanged { mut current, todos } => {
        tracing::debug!(key = %key, version = current.version, "update left ticket unchanged");
        current.todo_items =
          todos.into_iter().map(RawTodo::into_todo).collect::<Result<_>>().map_err(|e| e.during("update", &key))?;
        Ok(current)
      }
      Revision::Replaced { previous, row, todos } => {
        let ticket = assemble(row, todos).map_err(|e| e.during("update", &key))?;
        tracing::info!(key = %key, from = previous, to = ticket.version, "ticket updated");
        Ok(ticket)
      }
    }
  }

  async fn delete(&self, ticket: TicketRef, mode: DeleteMode) -> Result<Deletion> {
    match mode {
      DeleteMode::Soft => self.close_active(ticket).await.map(|ticket| Deletion::Soft { ticket }),
      DeleteMode::Hard => self.purge(ticket).await.map(|removed| Deletion::Hard { removed }),
    }
  }
}
