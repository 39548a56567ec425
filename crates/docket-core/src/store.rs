//! The `TicketStore` / `TodoStore` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `docket-store-sqlite`). The HTTP layer depends on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Classify, Error, Result,
  lifecycle::{DeleteMode, Deletion},
  ticket::{NewTicket, Ticket, TicketPatch, TicketRef},
  todo::{NewTodo, TodoItem, TodoPatch},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Largest page [`TicketStore::list`] will return.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Parameters for [`TicketStore::list`].
///
/// `category` and `active_only` filter; `limit` and `offset` only select the
/// page and never affect [`Page::total`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
  pub category:      Option<String>,
  pub active_only:   bool,
  pub include_todos: bool,
  pub limit:         usize,
  pub offset:        usize,
}

impl Default for TicketQuery {
  fn default() -> Self {
    Self { category: None, active_only: true, include_todos: false, limit: 100, offset: 0 }
  }
}

impl TicketQuery {
  pub fn validate(&self) -> Result<()> {
    if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
      return Err(Error::LimitOutOfRange { got: self.limit, max: MAX_PAGE_SIZE });
    }
    Ok(())
  }
}

/// One page of results plus the number of rows matching the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:  Vec<T>,
  pub total:  u64,
  pub limit:  usize,
  pub offset: usize,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Abstraction over a versioned ticket store.
///
/// Every change to a ticket is recorded as a new version; at most one version
/// per logical key is active. All methods return `Send` futures so the trait
/// can be used in multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TicketStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  /// Create version 1 of a new logical key.
  ///
  /// Fails with a conflict if the key already has an active version.
  fn create(
    &self,
    input: NewTicket,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// The active version of `ticket`, with its todo items attached.
  fn get_current(
    &self,
    ticket: TicketRef,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// Every version of `ticket`, newest first. Within one lineage that is
  /// descending version; a re-created ticket's rows come before the rows of
  /// the lineage it replaced. Empty if none exist.
  fn get_history(
    &self,
    ticket: TicketRef,
  ) -> impl Future<Output = Result<Vec<Ticket>, Self::Error>> + Send + '_;

  /// A page of tickets and the total count matching the query's filters.
  fn list(
    &self,
    query: TicketQuery,
  ) -> impl Future<Output = Result<Page<Ticket>, Self::Error>> + Send + '_;

  /// Replace the active version of `category`/`number` with a new version.
  ///
  /// Returns the current version unchanged, without writing, when the patch
  /// would not change anything.
  fn update(
    &self,
    category: String,
    number: String,
    patch: TicketPatch,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// Close the active version ([`DeleteMode::Soft`]) or erase every version
  /// ([`DeleteMode::Hard`]).
  fn delete(
    &self,
    ticket: TicketRef,
    mode: DeleteMode,
  ) -> impl Future<Output = Result<Deletion, Self::Error>> + Send + '_;
}

/// Checklist items owned by the active version of a ticket.
pub trait TodoStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  fn add_todo(
    &self,
    ticket: TicketRef,
    input: NewTodo,
  ) -> impl Future<Output = Result<TodoItem, Self::Error>> + Send + '_;

  /// Items of the active version, ordered by position.
  fn list_todos(
    &self,
    ticket: TicketRef,
  ) -> impl Future<Output = Result<Vec<TodoItem>, Self::Error>> + Send + '_;

  fn update_todo(
    &self,
    id: i64,
    patch: TodoPatch,
  ) -> impl Future<Output = Result<TodoItem, Self::Error>> + Send + '_;

  /// Returns `false` if no item had that id.
  fn delete_todo(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_query_lists_active_tickets() {
    let q = TicketQuery::default();
    assert!(q.active_only);
    assert_eq!((q.limit, q.offset), (100, 0));
    assert!(q.validate().is_ok());
  }

  #[test]
  fn zero_or_oversized_limit_is_rejected() {
    for limit in [0, MAX_PAGE_SIZE + 1] {
      let q = TicketQuery { limit, ..Default::default() };
      assert_eq!(
        q.validate(),
        Err(Error::LimitOutOfRange { got: limit, max: MAX_PAGE_SIZE })
      );
    }
  }
}
