//! Handlers for `/visits` endpoints.
//!
//! `POST /visits` creates a visit, or updates one when the body carries a
//! `visit_id`. Saving with a terminal status or `archive: true` archives the
//! visit and may close its plan.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use medrep_core::{
  query::VisitFilter,
  store::SalesStore,
  visit::{DailyVisit, VisitId, VisitInput},
};

use crate::{
  auth::Authenticated,
  error::ApiError,
  reply::{Row, Rows, row, rows},
};

/// `GET /visits`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Query(filter): Query<VisitFilter>,
) -> Result<Json<Rows<DailyVisit>>, ApiError>
where
  S: SalesStore + 'static,
{
  let visits = store.list_visits(actor, filter).await.map_err(ApiError::store)?;
  Ok(rows(visits))
}

/// `GET /visits/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<VisitId>,
) -> Result<Json<Row<DailyVisit>>, ApiError>
where
  S: SalesStore + 'static,
{
  let visit = store.get_visit(actor, id).await.map_err(ApiError::store)?;
  Ok(row(visit))
}

/// `POST /visits`
pub async fn save<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<VisitInput>,
) -> Result<Json<Row<DailyVisit>>, ApiError>
where
  S: SalesStore + 'static,
{
  let visit = store.save_visit(actor, body).await.map_err(ApiError::store)?;
  Ok(row(visit))
}

/// `POST /visits/{id}/archive`
pub async fn archive<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<VisitId>,
) -> Result<Json<Row<DailyVisit>>, ApiError>
where
  S: SalesStore + 'static,
{
  let visit = store.archive_visit(actor, id).await.map_err(ApiError::store)?;
  Ok(row(visit))
}
