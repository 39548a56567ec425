//! Error type for `docket-store-sqlite`.

use docket_core::{
  Classify, ErrorKind,
  ticket::{LogicalKey, TicketRef},
};
use rusqlite::{ErrorCode, types::Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  Core(#[from] docket_core::Error),

  #[error("invalid request: {0}")]
  Validation(String),

  #[error("an active version of {0} already exists")]
  Conflict(LogicalKey),

  /// A ticket cannot move onto a key that already has versions of its own.
  #[error("{0} already has a version history")]
  Occupied(LogicalKey),

  #[error("no active version of {0}")]
  NotFound(TicketRef),

  #[error("todo item not found: {0}")]
  TodoNotFound(i64),

  /// The connection could not be opened, or its worker thread is gone.
  #[error("connection error: {0}")]
  Connection(#[source] tokio_rusqlite::Error),

  /// Lock contention outlasted the busy timeout.
  #[error("database busy: {source}; query: {sql:?}")]
  Transient {
    sql:    String,
    params: Vec<Value>,
    #[source]
    source: rusqlite::Error,
  },

  #[error("query failed: {source}; query: {sql:?}; params: {params:?}")]
  Query {
    sql:    String,
    params: Vec<Value>,
    #[source]
    source: rusqlite::Error,
  },

  /// More than one active version for a single logical key.
  #[error("integrity violation: {active} active versions of {key}")]
  IntegrityViolation { key: LogicalKey, active: usize },

  #[error("decode error: {0}")]
  Decode(String),

  /// An infrastructure error annotated with the operation and ticket it
  /// interrupted.
  #[error("{op} {key}: {source}")]
  Failed {
    op:     &'static str,
    key:    String,
    #[source]
    source: Box<Error>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Wrap a driver error raised by `sql`, keeping the statement and its
  /// parameters for diagnostics.
  pub(crate) fn statement(sql: &str, params: &[Value], source: rusqlite::Error) -> Self {
    let sql = sql.to_owned();
    let params = params.to_vec();
    match source.sqlite_error_code() {
      Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
        Self::Transient { sql, params, source }
      }
      _ => Self::Query { sql, params, source },
    }
  }

  /// Map a `tokio-rusqlite` failure that happened outside any statement
  /// (thread gone, transaction begin/commit).
  pub(crate) fn call(sql: &str, source: tokio_rusqlite::Error) -> Self {
    match source {
      tokio_rusqlite::Error::Rusqlite(e) => Self::statement(sql, &[], e),
      other => Self::Connection(other),
    }
  }

  /// True if this is a violation of a UNIQUE constraint or index.
  pub fn is_unique_violation(&self) -> bool {
    match self {
      Self::Query { source: rusqlite::Error::SqliteFailure(e, _), .. } => {
        e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
      }
      Self::Failed { source, .. } => source.is_unique_violation(),
      _ => false,
    }
  }

  /// Annotate infrastructure errors with the operation and key. Domain errors
  /// already name their key and pass through untouched.
  pub(crate) fn during(self, op: &'static str, key: impl ToString) -> Self {
    match self {
      Self::Connection(_) | Self::Transient { .. } | Self::Query { .. } | Self::Decode(_) => {
        Self::Failed { op, key: key.to_string(), source: Box::new(self) }
      }
      other => other,
    }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(_) | Self::Validation(_) => ErrorKind::Validation,
      Self::Conflict(_) | Self::Occupied(_) => ErrorKind::Conflict,
      Self::NotFound(_) | Self::TodoNotFound(_) => ErrorKind::NotFound,
      Self::Connection(_) | Self::Transient { .. } => ErrorKind::Transient,
      Self::IntegrityViolation { .. } => ErrorKind::Integrity,
      Self::Query { .. } | Self::Decode(_) => ErrorKind::Internal,
      Self::Failed { source, .. } => source.kind(),
    }
  }
}
