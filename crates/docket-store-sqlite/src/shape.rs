//! Result shapes a [`Statement`](crate::executor::Statement) can declare.
//!
//! The shape is a type parameter, so the decoded output type is known at the
//! call site and checked by the compiler.

use std::marker::PhantomData;

use rusqlite::{
  Connection, OptionalExtension as _, params_from_iter,
  types::{FromSql, Value},
};

/// Decode one result row into `Self`.
pub trait FromRow: Sized + Send + 'static {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

pub trait Shape: Send + 'static {
  type Output: Send + 'static;

  fn fetch(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Self::Output>;
}

/// Every row, in query order.
pub struct Rows<T>(PhantomData<fn() -> T>);

/// The first row, or `None`.
pub struct OneRow<T>(PhantomData<fn() -> T>);

/// The first column of the first row, or `None` when there is no row.
pub struct Scalar<T>(PhantomData<fn() -> T>);

/// Number of rows changed by an INSERT, UPDATE or DELETE, as reported by the
/// driver.
pub struct Affected;

impl<T: FromRow> Shape for Rows<T> {
  type Output = Vec<T>;

  fn fetch(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
      .query_map(params_from_iter(params), T::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }
}

impl<T: FromRow> Shape for OneRow<T> {
  type Output = Option<T>;

  fn fetch(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Option<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let row = stmt.query_row(params_from_iter(params), T::from_row).optional()?;
    Ok(row)
  }
}

impl<T: FromSql + Send + 'static> Shape for Scalar<T> {
  type Output = Option<T>;

  fn fetch(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Option<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let value = stmt.query_row(params_from_iter(params), |row| row.get(0)).optional()?;
    Ok(value)
  }
}

impl Shape for Affected {
  type Output = usize;

  fn fetch(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<usize> {
    conn.prepare_cached(sql)?.execute(params_from_iter(params))
  }
}
