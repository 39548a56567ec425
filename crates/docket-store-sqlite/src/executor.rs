//! The query executor: parameterised statements over pooled connections.
//!
//! Statements carry their SQL text and an owned list of positional parameters
//! (`?1`, `?2`, …). Parameter values are always bound by the driver, never
//! spliced into the SQL.

use std::marker::PhantomData;

use rusqlite::{
  TransactionBehavior,
  types::{FromSql, Value},
};

use crate::{
  Error, Result,
  pool::Pool,
  shape::{Affected, FromRow, OneRow, Rows, Scalar, Shape},
};

// ─── Statements ──────────────────────────────────────────────────────────────

/// One SQL statement, its parameters, and the shape its result decodes into.
pub struct Statement<S> {
  sql:    String,
  params: Vec<Value>,
  shape:  PhantomData<fn() -> S>,
}

/// A statement returning every row as `T`.
pub fn rows<T: FromRow>(sql: impl Into<String>) -> Statement<Rows<T>> { Statement::new(sql) }

/// A statement returning at most one row as `T`.
pub fn one<T: FromRow>(sql: impl Into<String>) -> Statement<OneRow<T>> { Statement::new(sql) }

/// A statement returning a single value.
pub fn scalar<T: FromSql + Send + 'static>(sql: impl Into<String>) -> Statement<Scalar<T>> {
  Statement::new(sql)
}

/// A statement returning the number of rows it changed.
pub fn execute(sql: impl Into<String>) -> Statement<Affected> { Statement::new(sql) }

impl<S: Shape> Statement<S> {
  pub fn new(sql: impl Into<String>) -> Self {
    Self { sql: sql.into(), params: Vec::new(), shape: PhantomData }
  }

  /// Append the next positional parameter.
  pub fn bind(mut self, value: impl Into<Value>) -> Self {
    self.params.push(value.into());
    self
  }

  pub fn bind_all(mut self, values: impl IntoIterator<Item = Value>) -> Self {
    self.params.extend(values);
    self
  }

  fn fetch(&self, conn: &rusqlite::Connection) -> Result<S::Output> {
    tracing::trace!(sql = %self.sql, params = ?self.params, "executing statement");
    S::fetch(conn, &self.sql, &self.params).map_err(|e| {
      let err = Error::statement(&self.sql, &self.params, e);
      tracing::debug!(error = %err, "statement failed");
      err
    })
  }
}

// ─── Transaction scope ───────────────────────────────────────────────────────

/// An open transaction. Statements run through it see each other's writes;
/// nothing is visible to other connections until the enclosing
/// [`Executor::transaction`] commits.
pub struct Tx<'c> {
  inner: rusqlite::Transaction<'c>,
}

impl Tx<'_> {
  pub fn run<S: Shape>(&self, stmt: &Statement<S>) -> Result<S::Output> { stmt.fetch(&self.inner) }
}

// ─── Batches ─────────────────────────────────────────────────────────────────

/// An ordered group of statements executed in one transaction.
///
/// Implemented for a single [`Statement`], for a `Vec` of statements sharing a
/// shape, and for tuples of up to six batches of any shapes. Results come back
/// in input order with the same structure.
pub trait Batch: Send + 'static {
  type Output: Send + 'static;

  fn run_in(self, tx: &Tx<'_>) -> Result<Self::Output>;
}

impl<S: Shape> Batch for Statement<S> {
  type Output = S::Output;

  fn run_in(self, tx: &Tx<'_>) -> Result<S::Output> { tx.run(&self) }
}

impl<S: Shape> Batch for Vec<Statement<S>> {
  type Output = Vec<S::Output>;

  fn run_in(self, tx: &Tx<'_>) -> Result<Vec<S::Output>> {
    self.iter().map(|stmt| tx.run(stmt)).collect()
  }
}

macro_rules! tuple_batch {
  ($($name:ident),+) => {
    impl<$($name: Batch),+> Batch for ($($name,)+) {
      type Output = ($(<$name as Batch>::Output,)+);

      #[allow(non_snake_case)]
      fn run_in(self, tx: &Tx<'_>) -> Result<Self::Output> {
        let ($($name,)+) = self;
        Ok(($($name.run_in(tx)?,)+))
      }
    }
  };
}

tuple_batch!(A);
tuple_batch!(A, B);
tuple_batch!(A, B, C);
tuple_batch!(A, B, C, D);
tuple_batch!(A, B, C, D, E);
tuple_batch!(A, B, C, D, E, F);

// ─── Executor ────────────────────────────────────────────────────────────────

/// Runs statements against connections checked out of a [`Pool`].
///
/// Every call holds one pooled connection for its whole duration and releases
/// it on return, including on error.
#[derive(Clone)]
pub struct Executor {
  pool: Pool,
}

impl Executor {
  pub fn new(pool: Pool) -> Self { Self { pool } }

  pub fn pool(&self) -> &Pool { &self.pool }

  pub async fn connect(&self) -> Result<()> { self.pool.connect().await }

  pub async fn close(&self) -> Result<()> { self.pool.close().await }

  /// Run one statement outside any explicit transaction.
  pub async fn run<S: Shape>(&self, stmt: Statement<S>) -> Result<S::Output> {
    let conn = self.pool.acquire().await?;
    conn
      .call(move |conn| Ok(stmt.fetch(conn)))
      .await
      .map_err(Error::Connection)?
  }

  /// Run a multi-statement SQL script with no parameters and no results.
  pub async fn run_script(&self, script: &'static str) -> Result<()> {
    let conn = self.pool.acquire().await?;
    conn
      .call(move |conn| Ok(conn.execute_batch(script).map_err(|e| Error::statement(script, &[], e))))
      .await
      .map_err(Error::Connection)?
  }

  /// Run `batch` atomically and return each statement's result.
  ///
  /// If any statement fails, nothing the batch wrote is kept and that
  /// statement's error is returned.
  pub async fn run_batch<B: Batch>(&self, batch: B) -> Result<B::Output> {
    self.transaction(move |tx| batch.run_in(tx)).await
  }

  /// Run `f` inside a write transaction.
  ///
  /// The transaction starts with `BEGIN IMMEDIATE`, so the database write lock
  /// is held from the first read until commit. It commits only if `f` returns
  /// `Ok`; otherwise it rolls back. `f` runs to completion on the connection's
  /// thread even if the calling future is dropped.
  pub async fn transaction<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Tx<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.scoped(TransactionBehavior::Immediate, f).await
  }

  /// Run `f` inside a deferred transaction: several reads, one consistent
  /// snapshot.
  pub async fn snapshot<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Tx<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.scoped(TransactionBehavior::Deferred, f).await
  }

  async fn scoped<T, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
  where
    F: FnOnce(&Tx<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let conn = self.pool.acquire().await?;
    conn
      .call(move |conn| {
        let tx = Tx { inner: conn.transaction_with_behavior(behavior)? };
        match f(&tx) {
          Ok(value) => {
            tx.inner.commit()?;
            Ok(Ok(value))
          }
          Err(e) => {
            tracing::debug!(error = %e, "rolling back transaction");
            Ok(Err(e))
          }
        }
      })
      .await
      .map_err(|e| Error::call("BEGIN/COMMIT", e))?
  }
}
