//! Lifecycle of a logical key.
//!
//! ```text
//! NonExistent --create--> Active(v=1)
//! Active(v=n) --update--> Active(v=n+1)      (old row becomes Historical)
//! Active(v=n) --soft delete--> NonExistent   (history kept)
//! any         --hard delete--> NonExistent   (history erased)
//! ```
//!
//! A key with no active version accepts a fresh `create`, which starts again
//! at version 1.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, ticket::Ticket};

/// How [`crate::store::TicketStore::delete`] removes a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
  /// Close the active version without a replacement. Fails if nothing is
  /// active. History stays queryable.
  #[default]
  Soft,
  /// Remove every version of the key. Never fails for a missing key; this is
  /// an administrative operation that erases history irreversibly.
  Hard,
}

impl FromStr for DeleteMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "soft" => Ok(Self::Soft),
      "hard" => Ok(Self::Hard),
      other => Err(Error::UnknownDeleteMode(other.to_owned())),
    }
  }
}

/// Result of a delete, one variant per [`DeleteMode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Deletion {
  /// The version that was closed.
  Soft { ticket: Ticket },
  /// Number of rows removed; zero when the key did not exist.
  Hard { removed: usize },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delete_mode_parses_lowercase_names() {
    assert_eq!("soft".parse::<DeleteMode>(), Ok(DeleteMode::Soft));
    assert_eq!("hard".parse::<DeleteMode>(), Ok(DeleteMode::Hard));
    assert!(matches!(
      "purge".parse::<DeleteMode>(),
      Err(Error::UnknownDeleteMode(m)) if m == "purge"
    ));
  }
}
