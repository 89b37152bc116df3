//! SQLite backend for the medrep sales tracker.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutating operation runs the
//! matching [`medrep_core::workflow`] function inside one SQLite transaction.

mod encode;
mod query;
mod schema;
mod store;
mod tx;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
