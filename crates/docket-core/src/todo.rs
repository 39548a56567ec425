//! Todo items: a checklist attached to the active version of a ticket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
  pub id:          i64,
  /// Surrogate key of the ticket version that owns this item.
  pub ticket_id:   i64,
  pub description: String,
  pub done:        bool,
  /// Display order within the ticket, ascending.
  pub position:    i64,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::TodoStore::add_todo`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTodo {
  pub description: String,
  /// Appended after the last item when omitted.
  pub position:    Option<i64>,
}

impl NewTodo {
  pub fn validate(&self) -> Result<()> {
    if self.description.trim().is_empty() {
      return Err(Error::EmptyField("description"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
  pub description: Option<String>,
  pub done:        Option<bool>,
  pub position:    Option<i64>,
}

impl TodoPatch {
  pub fn validate(&self) -> Result<()> {
    if self.description.is_none() && self.done.is_none() && self.position.is_none() {
      return Err(Error::EmptyPatch);
    }
    if self.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
      return Err(Error::EmptyField("description"));
    }
    Ok(())
  }
}
