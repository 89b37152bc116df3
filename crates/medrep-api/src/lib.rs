//! JSON API for the medrep sales workflow.
//!
//! Exposes an axum [`Router`] backed by any [`medrep_core::store::SalesStore`].
//! Every route requires HTTP Basic credentials of a registered rep or
//! manager; role and ownership rules are enforced by the store. TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", medrep_api::api_router(Arc::new(store)))
//! ```

pub mod archives;
pub mod auth;
pub mod clients;
pub mod error;
pub mod plans;
pub mod reply;
pub mod visits;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use medrep_core::store::SalesStore;

pub use error::ApiError;

/// Build the API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: SalesStore + 'static,
{
  Router::new()
    // Plans
    .route("/plans", get(plans::list::<S>).post(plans::create::<S>))
    .route("/plans/weeks", get(plans::weeks::<S>))
    .route("/plans/{id}", get(plans::get_one::<S>))
    .route("/plans/{id}/approve", post(plans::approve::<S>))
    .route("/plans/{id}/reject", post(plans::reject::<S>))
    .route("/plans/{id}/archive", post(plans::archive::<S>))
    .route("/plans/{id}/start", post(plans::start::<S>))
    // Visits
    .route("/visits", get(visits::list::<S>).post(visits::save::<S>))
    .route("/visits/{id}", get(visits::get_one::<S>))
    .route("/visits/{id}/archive", post(visits::archive::<S>))
    // Clients
    .route("/clients", get(clients::list::<S>).post(clients::save::<S>))
    .route("/clients/finalize", post(clients::finalize::<S>))
    .route("/clients/{id}", get(clients::get_one::<S>))
    .route("/clients/{id}/archive", post(clients::archive::<S>))
    // Archive
    .route("/archives", get(archives::list::<S>))
    .route("/archives/sync", post(archives::sync::<S>))
    .route("/archives/merge", post(archives::merge::<S>))
    .route("/summary", get(archives::summary::<S>))
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
