//! Handlers for `/clients` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use medrep_core::{
  client::{Client, ClientId, ClientInput},
  query::ClientFilter,
  store::SalesStore,
  workflow::{FinalizeRequest, Finalized},
};

use crate::{
  auth::Authenticated,
  error::ApiError,
  reply::{Done, Row, Rows, done, row, rows},
};

/// `GET /clients`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Query(filter): Query<ClientFilter>,
) -> Result<Json<Rows<Client>>, ApiError>
where
  S: SalesStore + 'static,
{
  let clients = store.list_clients(actor, filter).await.map_err(ApiError::store)?;
  Ok(rows(clients))
}

/// `GET /clients/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<ClientId>,
) -> Result<Json<Row<Client>>, ApiError>
where
  S: SalesStore + 'static,
{
  let client = store.get_client(actor, id).await.map_err(ApiError::store)?;
  Ok(row(client))
}

/// `POST /clients`
pub async fn save<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<ClientInput>,
) -> Result<Json<Row<Client>>, ApiError>
where
  S: SalesStore + 'static,
{
  let client = store.save_client(actor, body).await.map_err(ApiError::store)?;
  Ok(row(client))
}

/// `POST /clients/{id}/archive`
pub async fn archive<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<ClientId>,
) -> Result<Json<Row<Client>>, ApiError>
where
  S: SalesStore + 'static,
{
  let client = store.archive_client(actor, id).await.map_err(ApiError::store)?;
  Ok(row(client))
}

/// `POST /clients/finalize`. Body: `{"client_id":..,"plan_id":..,"visit_id":..}`
pub async fn finalize<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<FinalizeRequest>,
) -> Result<Json<Done<Finalized>>, ApiError>
where
  S: SalesStore + 'static,
{
  let finalized = store.finalize_triplet(actor, body).await.map_err(ApiError::store)?;
  Ok(done(finalized))
}
