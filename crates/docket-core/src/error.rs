//! Error types for `docket-core`.

use thiserror::Error;

/// Input rejected before it reaches a store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("{0} must not be empty")]
  EmptyField(&'static str),

  #[error("at least one field must be supplied for an update")]
  EmptyPatch,

  #[error("limit must be between 1 and {max}, got {got}")]
  LimitOutOfRange { got: usize, max: usize },

  #[error("unknown delete mode: {0:?}")]
  UnknownDeleteMode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse error taxonomy shared by every store backend.
///
/// Protocol layers map these onto their own status codes; they never need to
/// know a backend's concrete error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed input or an update with nothing to change. Never retried.
  Validation,
  /// An active version already exists for the target logical key.
  Conflict,
  /// No matching (active) row.
  NotFound,
  /// Connectivity, lock contention or timeout. Safe to retry with backoff.
  Transient,
  /// More than one active version for one logical key.
  Integrity,
  Internal,
}

impl ErrorKind {
  pub fn is_retryable(self) -> bool { matches!(self, Self::Transient) }
}

/// Implemented by every error type a store can return.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind { ErrorKind::Validation }
}
