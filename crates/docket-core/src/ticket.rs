//! Ticket types, the versioned entity managed by the store.
//!
//! A ticket is identified across all of its versions by its logical key
//! (`category`, `number`). Each version is a separate row with its own
//! surrogate `id`; at most one version of a key is active at any time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result, todo::TodoItem};

// ─── Logical key ─────────────────────────────────────────────────────────────

/// The `(category, number)` pair identifying one ticket across all versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalKey {
  pub category: String,
  pub number:   String,
}

impl LogicalKey {
  pub fn new(category: impl Into<String>, number: impl Into<String>) -> Self {
    Self { category: category.into(), number: number.into() }
  }
}

impl fmt::Display for LogicalKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.category, self.number)
  }
}

/// A possibly-partial reference to a logical key.
///
/// Read and delete operations accept a bare ticket number; the category only
/// narrows the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRef {
  pub category: Option<String>,
  pub number:   String,
}

impl TicketRef {
  pub fn new(category: Option<impl Into<String>>, number: impl Into<String>) -> Self {
    Self { category: category.map(Into::into), number: number.into() }
  }

  pub fn exact(key: &LogicalKey) -> Self {
    Self { category: Some(key.category.clone()), number: key.number.clone() }
  }
}

impl fmt::Display for TicketRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.category {
      Some(c) => write!(f, "{c}/{}", self.number),
      None => write!(f, "*/{}", self.number),
    }
  }
}

impl From<LogicalKey> for TicketRef {
  fn from(key: LogicalKey) -> Self {
    Self { category: Some(key.category), number: key.number }
  }
}

// ─── Ticket ──────────────────────────────────────────────────────────────────

/// One version of a ticket.
///
/// `valid_to` is `None` exactly when `is_active` is `true`. Closed versions are
/// never modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
  /// Surrogate key; unique per version.
  pub id:                  i64,
  pub category:            String,
  pub number:              String,
  pub description:         String,
  pub completion_criteria: Option<String>,
  /// Starts at 1 and increases by one with every update.
  pub version:             u32,
  pub valid_from:          DateTime<Utc>,
  pub valid_to:            Option<DateTime<Utc>>,
  pub is_active:           bool,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
  /// Checklist owned by this version. Only populated on reads that ask for it.
  #[serde(default)]
  pub todo_items:          Vec<TodoItem>,
}

impl Ticket {
  pub fn key(&self) -> LogicalKey { LogicalKey::new(&self.category, &self.number) }
}

// ─── NewTicket ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::TicketStore::create`].
/// Versioning columns are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
  pub category:            String,
  pub number:              String,
  pub description:         String,
  pub completion_criteria: Option<String>,
}

impl NewTicket {
  pub fn new(
    category: impl Into<String>,
    number: impl Into<String>,
    description: impl Into<String>,
  ) -> Self {
    Self {
      category:            category.into(),
      number:              number.into(),
      description:         description.into(),
      completion_criteria: None,
    }
  }

  pub fn with_completion_criteria(mut self, criteria: impl Into<String>) -> Self {
    self.completion_criteria = Some(criteria.into());
    self
  }

  pub fn key(&self) -> LogicalKey { LogicalKey::new(&self.category, &self.number) }

  pub fn validate(&self) -> Result<()> {
    non_empty("category", &self.category)?;
    non_empty("number", &self.number)?;
    non_empty("description", &self.description)
  }
}

/// Generate a ticket number of the form `<CAT>-<unix-seconds>-<4 hex>` from
/// the first three characters of the category.
pub fn generate_number(category: &str, now: DateTime<Utc>) -> String {
  let prefix: String = category.chars().take(3).collect::<String>().to_uppercase();
  let suffix = uuid::Uuid::new_v4().simple().to_string();
  format!("{prefix}-{}-{}", now.timestamp(), &suffix[..4])
}

// ─── TicketPatch ─────────────────────────────────────────────────────────────

/// Fields to change in [`crate::store::TicketStore::update`]. `None` means
/// "carry forward from the current version".
///
/// `completion_criteria` is optional on the ticket itself, so it has three
/// states: absent (`None`), cleared (`Some(None)`, an explicit JSON `null`) and
/// set (`Some(Some(_))`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TicketPatch {
  pub category:            Option<String>,
  pub description:         Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub completion_criteria: Option<Option<String>>,
}

/// Maps a field that is present in the input, `null` included, to `Some`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  T::deserialize(deserializer).map(Some)
}

impl TicketPatch {
  pub fn is_empty(&self) -> bool {
    self.category.is_none() && self.description.is_none() && self.completion_criteria.is_none()
  }

  pub fn validate(&self) -> Result<()> {
    if self.is_empty() {
      return Err(Error::EmptyPatch);
    }
    if let Some(c) = &self.category {
      non_empty("category", c)?;
    }
    if let Some(d) = &self.description {
      non_empty("description", d)?;
    }
    Ok(())
  }

  /// The payload that would result from applying this patch to `current`.
  pub fn merge(&self, current: &Ticket) -> Payload {
    Payload {
      category:            self.category.clone().unwrap_or_else(|| current.category.clone()),
      description:         self
        .description
        .clone()
        .unwrap_or_else(|| current.description.clone()),
      completion_criteria: match &self.completion_criteria {
        Some(replacement) => replacement.clone(),
        None => current.completion_criteria.clone(),
      },
    }
  }
}

/// The mutable portion of a ticket version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
  pub category:            String,
  pub description:         String,
  pub completion_criteria: Option<String>,
}

impl Payload {
  pub fn of(ticket: &Ticket) -> Self {
    Self {
      category:            ticket.category.clone(),
      description:         ticket.description.clone(),
      completion_criteria: ticket.completion_criteria.clone(),
    }
  }
}

fn non_empty(field: &'static str, value: &str) -> Result<()> {
  if value.trim().is_empty() { Err(Error::EmptyField(field)) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn ticket() -> Ticket {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Ticket {
      id:                  1,
      category:            "Fitness".into(),
      number:              "FIT-1".into(),
      description:         "Train for 10k".into(),
      completion_criteria: Some("finish under 60 minutes".into()),
      version:             1,
      valid_from:          at,
      valid_to:            None,
      is_active:           true,
      created_at:          at,
      updated_at:          at,
      todo_items:          Vec::new(),
    }
  }

  #[test]
  fn new_ticket_rejects_blank_fields() {
    let t = NewTicket::new("Vacation", "  ", "Plan trip");
    assert_eq!(t.validate(), Err(Error::EmptyField("number")));
    assert!(NewTicket::new("Vacation", "VAC-1", "Plan trip").validate().is_ok());
  }

  #[test]
  fn empty_patch_is_rejected() {
    assert_eq!(TicketPatch::default().validate(), Err(Error::EmptyPatch));
  }

  #[test]
  fn merge_carries_forward_unspecified_fields() {
    let current = ticket();
    let patch = TicketPatch {
      description: Some("Train for half marathon".into()),
      ..Default::default()
    };
    let merged = patch.merge(&current);
    assert_eq!(merged.category, "Fitness");
    assert_eq!(merged.description, "Train for half marathon");
    assert_eq!(merged.completion_criteria.as_deref(), Some("finish under 60 minutes"));
  }

  #[test]
  fn explicit_null_clears_completion_criteria() {
    let clear: TicketPatch = serde_json::from_str(r#"{"completion_criteria": null}"#).unwrap();
    assert_eq!(clear.completion_criteria, Some(None));
    assert!(clear.validate().is_ok());
    assert_eq!(clear.merge(&ticket()).completion_criteria, None);

    let absent: TicketPatch = serde_json::from_str(r#"{"description": "Walk"}"#).unwrap();
    assert_eq!(absent.completion_criteria, None);
    assert_eq!(
      absent.merge(&ticket()).completion_criteria.as_deref(),
      Some("finish under 60 minutes")
    );

    let set: TicketPatch = serde_json::from_str(r#"{"completion_criteria": "sub 55"}"#).unwrap();
    assert_eq!(set.merge(&ticket()).completion_criteria.as_deref(), Some("sub 55"));
  }

  #[test]
  fn merge_with_identical_values_equals_current_payload() {
    let current = ticket();
    let patch = TicketPatch { category: Some("Fitness".into()), ..Default::default() };
    assert_eq!(patch.merge(&current), Payload::of(&current));
  }

  #[test]
  fn generated_number_uses_category_prefix() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let n = generate_number("vacation", at);
    assert!(n.starts_with(&format!("VAC-{}-", at.timestamp())), "{n}");
    assert_eq!(n.rsplit('-').next().map(str::len), Some(4));
  }

  #[test]
  fn ticket_ref_display_marks_missing_category() {
    assert_eq!(TicketRef::new(None::<String>, "VAC-1").to_string(), "*/VAC-1");
    assert_eq!(LogicalKey::new("Vacation", "VAC-1").to_string(), "Vacation/VAC-1");
  }
}
