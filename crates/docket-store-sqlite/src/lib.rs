//! SQLite backend for the Docket ticket store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on dedicated
//! connection threads without blocking the async runtime. Connections come
//! from a small [`Pool`]; statements run through the typed [`Executor`].

mod encode;
mod schema;
mod store;
mod todos;

pub mod error;
pub mod executor;
pub mod pool;
pub mod shape;

pub use error::{Error, Result};
pub use executor::Executor;
pub use pool::{Pool, PoolConfig};
pub use store::SqliteStore;
