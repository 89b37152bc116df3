//! Core types, rules, and the archival workflow for the medrep sales tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::UnitOfWork`] (one transaction) and
//! [`store::SalesStore`] (the async face the API depends on). The lifecycle
//! rules in [`workflow`] and [`archival`] run inside a backend transaction.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod archival;
pub mod auth;
pub mod client;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod plan;
pub mod query;
pub mod rep;
pub mod snapshot;
pub mod store;
pub mod visit;
pub mod workflow;

pub use error::{EntityKind, Error, Result};
