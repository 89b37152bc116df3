//! Handlers for the archive ledger and the manager dashboard. All of these
//! are manager only; the store enforces it.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use medrep_core::{
  query::{SnapshotFilter, Summary, SyncReport},
  rep::RepId,
  snapshot::{ArchiveSnapshot, MergeReport},
  store::SalesStore,
};
use serde::Deserialize;

use crate::{
  auth::Authenticated,
  error::ApiError,
  reply::{Done, Rows, done, rows},
};

/// `GET /archives[?q=&week=&rep=]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Query(filter): Query<SnapshotFilter>,
) -> Result<Json<Rows<ArchiveSnapshot>>, ApiError>
where
  S: SalesStore + 'static,
{
  let snapshots = store.list_snapshots(actor, filter).await.map_err(ApiError::store)?;
  Ok(rows(snapshots))
}

/// `POST /archives/sync`
pub async fn sync<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
) -> Result<Json<Done<SyncReport>>, ApiError>
where
  S: SalesStore + 'static,
{
  let report = store.sync_archives(actor).await.map_err(ApiError::store)?;
  Ok(done(report))
}

#[derive(Debug, Deserialize)]
pub struct MergeParams {
  pub rep:  RepId,
  pub week: i64,
}

/// `POST /archives/merge?rep=<id>&week=<n>`
pub async fn merge<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Query(params): Query<MergeParams>,
) -> Result<Json<Done<MergeReport>>, ApiError>
where
  S: SalesStore + 'static,
{
  let report = store
    .merge_duplicates(actor, params.rep, params.week)
    .await
    .map_err(ApiError::store)?;
  Ok(done(report))
}

/// `GET /summary`
pub async fn summary<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
) -> Result<Json<Done<Summary>>, ApiError>
where
  S: SalesStore + 'static,
{
  let summary = store.summary(actor).await.map_err(ApiError::store)?;
  Ok(done(summary))
}
