//! A small pool of [`tokio_rusqlite`] connections.
//!
//! Each connection runs its statements on a dedicated thread. The pool hands
//! out one connection per logical operation; the [`PooledConnection`] guard
//! puts it back when dropped, whichever way the operation ends.

use std::{
  ops::Deref,
  path::{Path, PathBuf},
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use serde::Deserialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_rusqlite::Connection;

use crate::{Error, Result};

/// Path value selecting a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// Applied to every connection as it is opened.
const CONNECTION_PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
PRAGMA journal_mode = WAL;
";

// ─── Configuration ───────────────────────────────────────────────────────────

/// Pool settings, usually deserialised from the `[database]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
  /// Database file, or `":memory:"`.
  pub path:            PathBuf,
  #[serde(default = "default_max_connections")]
  pub max_connections: usize,
  /// How long a writer waits for the database lock before giving up.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_max_connections() -> usize { 4 }

fn default_busy_timeout_ms() -> u64 { 5_000 }

impl PoolConfig {
  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self {
      path:            path.into(),
      max_connections: default_max_connections(),
      busy_timeout_ms: default_busy_timeout_ms(),
    }
  }

  pub fn in_memory() -> Self { Self::file(MEMORY) }

  pub fn is_memory(&self) -> bool { self.path == Path::new(MEMORY) }

  /// Every in-memory connection is its own database, so an in-memory pool
  /// holds exactly one.
  pub fn capacity(&self) -> usize {
    if self.is_memory() { 1 } else { self.max_connections.max(1) }
  }
}

// ─── Pool ────────────────────────────────────────────────────────────────────

/// Cloning is cheap; clones share the same connections.
#[derive(Clone)]
pub struct Pool {
  inner: Arc<Inner>,
}

struct Inner {
  config:     PoolConfig,
  idle:       Mutex<Vec<Connection>>,
  permits:    Arc<Semaphore>,
  /// Bumped by [`Pool::close`]; guards from an older generation discard their
  /// connection instead of returning it.
  generation: AtomicU64,
}

impl Pool {
  pub fn new(config: PoolConfig) -> Self {
    let permits = Arc::new(Semaphore::new(config.capacity()));
    Self {
      inner: Arc::new(Inner {
        config,
        idle: Mutex::new(Vec::new()),
        permits,
        generation: AtomicU64::new(0),
      }),
    }
  }

  pub fn config(&self) -> &PoolConfig { &self.inner.config }

  /// Number of open connections currently waiting in the pool.
  pub fn idle(&self) -> usize { self.inner.lock_idle().len() }

  /// Make sure at least one connection is open. Opens nothing if an idle
  /// connection already exists.
  pub async fn connect(&self) -> Result<()> {
    self.acquire().await.map(drop)
  }

  /// Check out a connection, waiting if all of them are in use.
  pub async fn acquire(&self) -> Result<PooledConnection> {
    let permit = Arc::clone(&self.inner.permits)
      .acquire_owned()
      .await
      .map_err(|_| Error::Connection(tokio_rusqlite::Error::ConnectionClosed))?;
    let generation = self.inner.generation.load(Ordering::Acquire);
    if generation > 0 && self.inner.config.is_memory() {
      // The database went away with its only connection.
      return Err(Error::Connection(tokio_rusqlite::Error::ConnectionClosed));
    }

    let reused = self.inner.lock_idle().pop();
    let conn = match reused {
      Some(conn) => conn,
      None => self.open().await?,
    };

    Ok(PooledConnection {
      conn,
      generation,
      pool: Arc::clone(&self.inner),
      _permit: permit,
    })
  }

  /// Close every idle connection. Connections that are checked out are
  /// discarded when their guard drops. Calling this again is harmless.
  ///
  /// A file pool reopens on the next [`Pool::acquire`]. An in-memory pool
  /// cannot: closing its connection discards the database, so every later
  /// `acquire` fails with [`Error::Connection`].
  pub async fn close(&self) -> Result<()> {
    self.inner.generation.fetch_add(1, Ordering::AcqRel);
    let idle = std::mem::take(&mut *self.inner.lock_idle());

    let mut failure = None;
    for conn in idle {
      if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close sqlite connection");
        failure = Some(e);
      }
    }
    match failure {
      Some(e) => Err(Error::Connection(e)),
      None => Ok(()),
    }
  }

  async fn open(&self) -> Result<Connection> {
    let config = &self.inner.config;
    let conn = if config.is_memory() {
      Connection::open_in_memory().await
    } else {
      Connection::open(&config.path).await
    }
    .map_err(Error::Connection)?;

    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(())
      })
      .await
      .map_err(Error::Connection)?;

    tracing::debug!(path = %config.path.display(), "opened sqlite connection");
    Ok(conn)
  }
}

impl Inner {
  fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<Connection>> {
    self.idle.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

// ─── Guard ───────────────────────────────────────────────────────────────────

/// A connection checked out of a [`Pool`]. Returned to the pool on drop.
pub struct PooledConnection {
  conn:       Connection,
  generation: u64,
  pool:       Arc<Inner>,
  _permit:    OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
  type Target = Connection;

  fn deref(&self) -> &Connection { &self.conn }
}

impl Drop for PooledConnection {
  fn drop(&mut self) {
    // A `Connection` is a handle to its worker thread; the clone keeps the
    // thread alive after this guard's handle is dropped.
    if self.pool.generation.load(Ordering::Acquire) == self.generation {
      self.pool.lock_idle().push(self.conn.clone());
    }
  }
}
