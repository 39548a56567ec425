//! JSON REST API for Docket.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`TicketStore`] and [`TodoStore`]. Auth and TLS are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", docket_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod tickets;
pub mod todos;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::{get, patch},
};
use docket_core::store::{TicketStore, TodoStore};
use docket_store_sqlite::PoolConfig;
use serde::Deserialize;
use serde_json::{Value, json};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DOCKET_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:     String,
  #[serde(default = "default_port")]
  pub port:     u16,
  #[serde(default = "default_database")]
  pub database: PoolConfig,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8000 }

fn default_database() -> PoolConfig { PoolConfig::file(PathBuf::from("docket.db")) }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: TicketStore + TodoStore + 'static,
{
  Router::new()
    .route("/", get(health))
    // Tickets
    .route("/tickets", get(tickets::list::<S>).post(tickets::create::<S>))
    .route(
      "/tickets/{number}",
      get(tickets::get_one::<S>)
        .patch(tickets::update::<S>)
        .delete(tickets::delete_one::<S>),
    )
    // Todos
    .route("/tickets/{number}/todos", get(todos::list::<S>).post(todos::create::<S>))
    .route("/todos/{id}", patch(todos::update::<S>).delete(todos::delete_one::<S>))
    .with_state(store)
}

/// `GET /`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests;
