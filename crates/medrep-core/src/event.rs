//! Domain events emitted after a successful write.
//!
//! Workflows dispatch events synchronously inside the same transaction as the
//! write that raised them; [`dispatch`] routes each to its archival handler.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  EntityKind, Error, Result,
  archival::{self, Cascade},
  client::ClientId,
  plan::PlanId,
  rep::Actor,
  store::UnitOfWork,
  visit::VisitId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
  PlanApproved { plan_id: PlanId },
  VisitSaved { visit_id: VisitId, archive_requested: bool },
  ClientSaved { client_id: ClientId },
}

pub fn dispatch<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  event: DomainEvent,
  now: DateTime<Utc>,
) -> Result<Cascade> {
  tracing::debug!(?event, "dispatching");
  match event {
    DomainEvent::PlanApproved { plan_id } => {
      let plan = uow
        .plan(plan_id)?
        .ok_or_else(|| Error::not_found(EntityKind::Plan, plan_id))?;
      archival::on_plan_approved(uow, &plan, now)
    }
    DomainEvent::VisitSaved { visit_id, archive_requested } => {
      let mut visit = uow
        .visit(visit_id)?
        .ok_or_else(|| Error::not_found(EntityKind::Visit, visit_id))?;
      archival::on_visit_saved(uow, actor, &mut visit, archive_requested, now)
    }
    DomainEvent::ClientSaved { client_id } => {
      archival::cascade_archive_client_save(uow, client_id, now)
    }
  }
}
