//! Handlers for `/plans` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/plans` | `?show=active\|deleted\|all&q=&week=&status=` |
//! | `POST` | `/plans` | Body: [`NewPlan`] |
//! | `GET`  | `/plans/weeks` | Weeks with an approved plan |
//! | `GET`  | `/plans/{id}` | 404 if not found |
//! | `POST` | `/plans/{id}/approve` | Manager only; archives the plan |
//! | `POST` | `/plans/{id}/reject` | Manager only |
//! | `POST` | `/plans/{id}/archive` | Owner or manager |
//! | `POST` | `/plans/{id}/start` | Get-or-create the plan's visit |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use medrep_core::{
  plan::{NewPlan, PlanId, WeekNumber, WeeklyPlan},
  query::PlanFilter,
  snapshot::ArchiveSnapshot,
  store::SalesStore,
  visit::DailyVisit,
};
use serde::Serialize;

use crate::{
  auth::Authenticated,
  error::ApiError,
  reply::{Row, Rows, row, rows},
};

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /plans`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Query(filter): Query<PlanFilter>,
) -> Result<Json<Rows<WeeklyPlan>>, ApiError>
where
  S: SalesStore + 'static,
{
  let plans = store.list_plans(actor, filter).await.map_err(ApiError::store)?;
  Ok(rows(plans))
}

/// `GET /plans/weeks`
pub async fn weeks<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
) -> Result<Json<Rows<WeekNumber>>, ApiError>
where
  S: SalesStore + 'static,
{
  let weeks = store.approved_weeks(actor).await.map_err(ApiError::store)?;
  Ok(rows(weeks))
}

/// `GET /plans/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<PlanId>,
) -> Result<Json<Row<WeeklyPlan>>, ApiError>
where
  S: SalesStore + 'static,
{
  let plan = store.get_plan(actor, id).await.map_err(ApiError::store)?;
  Ok(row(plan))
}

// ─── Writes ───────────────────────────────────────────────────────────────────

/// `POST /plans`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<NewPlan>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  let plan = store.create_plan(actor, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, row(plan)))
}

/// Body of a successful approval. `snapshot` is absent and `warning` set when
/// the archive row could not be written.
#[derive(Debug, Serialize)]
pub struct ApprovalReply {
  pub ok:       bool,
  pub row:      WeeklyPlan,
  pub snapshot: Option<ArchiveSnapshot>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warning:  Option<String>,
}

/// `POST /plans/{id}/approve`
pub async fn approve<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<PlanId>,
) -> Result<Json<ApprovalReply>, ApiError>
where
  S: SalesStore + 'static,
{
  let approval = store.approve_plan(actor, id).await.map_err(ApiError::store)?;
  Ok(Json(ApprovalReply {
    ok:       true,
    row:      approval.plan,
    snapshot: approval.snapshot,
    warning:  approval.warning,
  }))
}

/// `POST /plans/{id}/reject`
pub async fn reject<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<PlanId>,
) -> Result<Json<Row<WeeklyPlan>>, ApiError>
where
  S: SalesStore + 'static,
{
  let plan = store.reject_plan(actor, id).await.map_err(ApiError::store)?;
  Ok(row(plan))
}

/// `POST /plans/{id}/archive`
pub async fn archive<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<PlanId>,
) -> Result<Json<Row<WeeklyPlan>>, ApiError>
where
  S: SalesStore + 'static,
{
  let plan = store.archive_plan(actor, id).await.map_err(ApiError::store)?;
  Ok(row(plan))
}

/// `POST /plans/{id}/start`
pub async fn start<S>(
  State(store): State<Arc<S>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<PlanId>,
) -> Result<Json<Row<DailyVisit>>, ApiError>
where
  S: SalesStore + 'static,
{
  let visit = store.start_from_plan(actor, id).await.map_err(ApiError::store)?;
  Ok(row(visit))
}
