//! Error types for `medrep-core`.

use serde::Serialize;
use strum::Display;
use thiserror::Error;

/// The kind of record an id refers to; used in [`Error::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Rep,
  Plan,
  Visit,
  Client,
  Snapshot,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("authentication required")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("{kind} not found: {id}")]
  NotFound { kind: EntityKind, id: i64 },

  #[error("validation failed: {0}")]
  Validation(String),

  /// Duplicate snapshot rows or a failed snapshot write. Recovered locally and
  /// logged; never returned from a public operation.
  #[error("archive inconsistency: {0}")]
  ArchivalInconsistency(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(kind: EntityKind, id: i64) -> Self { Self::NotFound { kind, id } }

  pub fn forbidden(reason: impl Into<String>) -> Self { Self::Forbidden(reason.into()) }

  pub fn validation(reason: impl Into<String>) -> Self { Self::Validation(reason.into()) }

  pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
