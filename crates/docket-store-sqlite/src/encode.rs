//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with exactly six fractional
//! digits and a `Z` suffix, so comparing two columns as text compares them as
//! instants.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use docket_core::{ticket::Ticket, todo::TodoItem};

use crate::{Error, Result, shape::FromRow};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current instant at the precision the database keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `tickets` row.
pub struct RawTicket {
  pub id:                  i64,
  pub category:            String,
  pub number:              String,
  pub description:         String,
  pub completion_criteria: Option<String>,
  pub version:             i64,
  pub valid_from:          String,
  pub valid_to:            Option<String>,
  pub is_active:           bool,
  pub created_at:          String,
  pub updated_at:          String,
}

impl FromRow for RawTicket {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawTicket {
      id:                  row.get("id")?,
      category:            row.get("ticket_category")?,
      number:              row.get("ticket_number")?,
      description:         row.get("description")?,
      completion_criteria: row.get("completion_criteria")?,
      version:             row.get("version")?,
      valid_from:          row.get("valid_from")?,
      valid_to:            row.get("valid_to")?,
      is_active:           row.get("is_active")?,
      created_at:          row.get("created_at")?,
      updated_at:          row.get("updated_at")?,
    })
  }
}

impl RawTicket {
  pub fn into_ticket(self) -> Result<Ticket> {
    let version = u32::try_from(self.version)
      .map_err(|_| Error::Decode(format!("ticket {} has version {}", self.id, self.version)))?;

    let valid_to = self.valid_to.as_deref().map(decode_dt).transpose()?;
    if valid_to.is_none() != self.is_active {
      return Err(Error::Decode(format!(
        "ticket {} has is_active = {} but valid_to = {:?}",
        self.id, self.is_active, self.valid_to
      )));
    }

    Ok(Ticket {
      id: self.id,
      category: self.category,
      number: self.number,
      description: self.description,
      completion_criteria: self.completion_criteria,
      version,
      valid_from: decode_dt(&self.valid_from)?,
      valid_to,
      is_active: self.is_active,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      todo_items: Vec::new(),
    })
  }
}

/// Raw values read directly from a `todo_items` row.
pub struct RawTodo {
  pub id:          i64,
  pub ticket_id:   i64,
  pub description: String,
  pub done:        bool,
  pub position:    i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl FromRow for RawTodo {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawTodo {
      id:          row.get("id")?,
      ticket_id:   row.get("ticket_id")?,
      description: row.get("description")?,
      done:        row.get("done")?,
      position:    row.get("position")?,
      created_at:  row.get("created_at")?,
      updated_at:  row.get("updated_at")?,
    })
  }
}

impl RawTodo {
  pub fn into_todo(self) -> Result<TodoItem> {
    Ok(TodoItem {
      id:          self.id,
      ticket_id:   self.ticket_id,
      description: self.description,
      done:        self.done,
      position:    self.position,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_as_text() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::Duration::microseconds(1_500_000);
    let (a, b) = (encode_dt(early), encode_dt(late));
    assert_eq!(a, "2024-01-01T09:00:00.000000Z");
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap(), late);
  }

  #[test]
  fn now_survives_a_round_trip() {
    let t = now();
    assert_eq!(decode_dt(&encode_dt(t)).unwrap(), t);
  }

  #[test]
  fn malformed_timestamp_is_a_decode_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::Decode(_))));
  }
}
