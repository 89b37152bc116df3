//! Mutating operations of the sales workflow.
//!
//! Each function runs inside one [`UnitOfWork`] and takes the calling
//! [`Actor`] and the current time. Role, ownership, and validation checks all
//! happen before the first write, so a rejected request leaves no trace.
//! Writes that should trigger archival dispatch a [`DomainEvent`] once the
//! row itself has been stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  EntityKind, Error, Result,
  archival::{self, best_effort},
  auth::{require_manager, require_owner},
  client::{Client, ClientInput},
  event::{self, DomainEvent},
  lifecycle::{SoftDelete, Stamp, audit_line},
  plan::{NewPlan, PlanId, PlanStatus, WeekNumber, WeeklyPlan},
  query::SyncReport,
  rep::{Actor, RepId},
  snapshot::{ArchiveSnapshot, Counters, MergeReport, SnapshotDetails},
  store::UnitOfWork,
  visit::{DailyVisit, VisitId, VisitInput},
};

// ─── Results ─────────────────────────────────────────────────────────────────

/// Outcome of [`approve_plan`].
#[derive(Debug, Clone, Serialize)]
pub struct Approval {
  pub plan:     WeeklyPlan,
  /// The week's snapshot; absent when the snapshot write failed.
  pub snapshot: Option<ArchiveSnapshot>,
  /// Why the snapshot write failed, if it did.
  pub warning:  Option<String>,
}

/// Ids for [`finalize_triplet`]. All three are required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FinalizeRequest {
  pub client_id: Option<i64>,
  pub plan_id:   Option<i64>,
  pub visit_id:  Option<i64>,
}

/// The three rows archived by [`finalize_triplet`].
#[derive(Debug, Clone, Serialize)]
pub struct Finalized {
  pub client: Client,
  pub plan:   WeeklyPlan,
  pub visit:  DailyVisit,
}

// ─── Loaders ─────────────────────────────────────────────────────────────────

pub fn load_plan<U: UnitOfWork>(uow: &mut U, id: PlanId) -> Result<WeeklyPlan> {
  uow.plan(id)?.ok_or_else(|| Error::not_found(EntityKind::Plan, id))
}

pub fn load_visit<U: UnitOfWork>(uow: &mut U, id: VisitId) -> Result<DailyVisit> {
  uow.visit(id)?.ok_or_else(|| Error::not_found(EntityKind::Visit, id))
}

pub fn load_client<U: UnitOfWork>(uow: &mut U, id: i64) -> Result<Client> {
  uow.client(id)?.ok_or_else(|| Error::not_found(EntityKind::Client, id))
}

/// The rep a new or reassigned row belongs to.
///
/// Reps always act for themselves. A manager may name another rep, who must
/// exist.
fn assigned_rep<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  requested: Option<RepId>,
  current: Option<RepId>,
) -> Result<RepId> {
  if !actor.is_manager() {
    return Ok(current.unwrap_or(actor.rep_id));
  }
  let rep_id = requested.or(current).unwrap_or(actor.rep_id);
  if rep_id != actor.rep_id && uow.rep(rep_id)?.is_none() {
    return Err(Error::not_found(EntityKind::Rep, rep_id));
  }
  Ok(rep_id)
}

// ─── Plans ───────────────────────────────────────────────────────────────────

pub fn create_plan<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  input: NewPlan,
  now: DateTime<Utc>,
) -> Result<WeeklyPlan> {
  let week_number = WeekNumber::new(input.week_number)?;
  let details = input.details.normalized()?;
  let rep_id = assigned_rep(uow, actor, input.rep_id, None)?;

  let mut plan = WeeklyPlan {
    plan_id: 0,
    rep_id,
    week_number,
    planned_date: input.planned_date,
    details,
    status: PlanStatus::Pending,
    deletion: SoftDelete::default(),
    created_at: now,
    updated_at: now,
  };
  plan.plan_id = uow.insert_plan(&plan)?;
  info!(plan_id = plan.plan_id, rep_id, week = %week_number, "plan created");
  Ok(plan)
}

/// Approve a plan, snapshot its week, then archive it.
///
/// The snapshot write is best-effort: if it fails the approval and the
/// archive still commit and the failure comes back as `warning`. Approving
/// an approved plan again refreshes the same snapshot row.
pub fn approve_plan<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  id: PlanId,
  now: DateTime<Utc>,
) -> Result<Approval> {
  require_manager(actor, "approve plans")?;
  let mut plan = load_plan(uow, id)?;

  if plan.status.decide(PlanStatus::Approved)? {
    plan.status = PlanStatus::Approved;
    plan.updated_at = now;
    uow.update_plan(&plan)?;
  }

  let cascade =
    event::dispatch(uow, actor, DomainEvent::PlanApproved { plan_id: id }, now)?;

  if plan.deletion.archive(Stamp { at: now, by: plan.rep_id }) {
    plan.updated_at = now;
    uow.update_plan(&plan)?;
  }

  info!(plan_id = id, by = %actor.username, "plan approved and archived");
  let warning = (!cascade.warnings.is_empty()).then(|| cascade.warnings.join("; "));
  Ok(Approval { plan, snapshot: cascade.snapshot, warning })
}

pub fn reject_plan<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  id: PlanId,
  now: DateTime<Utc>,
) -> Result<WeeklyPlan> {
  require_manager(actor, "reject plans")?;
  let mut plan = load_plan(uow, id)?;
  if plan.status.decide(PlanStatus::Rejected)? {
    plan.status = PlanStatus::Rejected;
    plan.updated_at = now;
    uow.update_plan(&plan)?;
    info!(plan_id = id, by = %actor.username, "plan rejected");
  }
  Ok(plan)
}

/// Soft-delete a plan without touching its status.
pub fn archive_plan<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  id: PlanId,
  now: DateTime<Utc>,
) -> Result<WeeklyPlan> {
  let mut plan = load_plan(uow, id)?;
  require_owner(actor, plan.rep_id, "plan")?;
  if plan.deletion.archive(Stamp { at: now, by: actor.rep_id }) {
    plan.updated_at = now;
    uow.update_plan(&plan)?;
    info!(plan_id = id, "plan archived");
  }
  Ok(plan)
}

/// Get-or-create the caller's visit for an approved plan.
///
/// Keyed by `(rep, plan)`: a second call returns the first visit, and a
/// previously archived visit is restored instead of duplicated. Duplicate
/// snapshot rows for the week are repaired first.
pub fn start_from_plan<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  id: PlanId,
  now: DateTime<Utc>,
) -> Result<DailyVisit> {
  let plan = load_plan(uow, id)?;
  if plan.rep_id != actor.rep_id {
    return Err(Error::forbidden("plan belongs to another rep"));
  }
  if plan.status != PlanStatus::Approved {
    return Err(Error::validation(format!(
      "only approved plans can be started, plan {id} is {}",
      plan.status
    )));
  }

  // Warnings are already logged.
  let _ = best_effort(uow, "repair snapshot before start", |uow| {
    let report = archival::merge_duplicates(uow, plan.rep_id, plan.week_number)?;
    if report.canonical.is_none() {
      let details = SnapshotDetails::from_plan(&plan, PlanStatus::Approved.label());
      archival::upsert_snapshot(uow, plan.rep_id, plan.week_number, details, now)?;
    }
    Ok(())
  })?;

  if let Some(mut visit) = uow.visit_for_plan(actor.rep_id, id)? {
    if !visit.deletion.is_active() {
      visit.deletion.restore();
      visit.last_change = audit_line(now, &format!("{} restored", actor.username));
      visit.updated_at = now;
      uow.update_visit(&visit)?;
      info!(visit_id = visit.visit_id, plan_id = id, "visit restored from plan");
    }
    return Ok(visit);
  }

  let mut visit = DailyVisit::from_plan(&plan, now);
  visit.last_change = audit_line(now, &format!("{} created", actor.username));
  visit.visit_id = uow.insert_visit(&visit)?;
  info!(visit_id = visit.visit_id, plan_id = id, "visit started from plan");
  Ok(visit)
}

// ─── Visits ──────────────────────────────────────────────────────────────────

/// Create or update a visit.
///
/// Reps must link the visit to one of their own approved plans. The week is
/// taken from the input, else the plan. Blank contact fields are filled from
/// the linked client. A terminal status or an explicit archive flag archives
/// the visit and, if it was the plan's last active one, the plan.
pub fn save_visit<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  input: VisitInput,
  now: DateTime<Utc>,
) -> Result<DailyVisit> {
  let existing = match input.visit_id {
    Some(id) => {
      let visit = load_visit(uow, id)?;
      require_owner(actor, visit.rep_id, "visit")?;
      Some(visit)
    }
    None => None,
  };

  let rep_id =
    assigned_rep(uow, actor, input.rep_id, existing.as_ref().map(|v| v.rep_id))?;

  let plan_id = input
    .weekly_plan_id
    .or(existing.as_ref().and_then(|v| v.weekly_plan_id));
  let plan = match plan_id {
    Some(id) => Some(load_plan(uow, id)?),
    None => None,
  };

  if !actor.is_manager() {
    let Some(plan) = &plan else {
      return Err(Error::validation("a weekly plan is required"));
    };
    if plan.rep_id != actor.rep_id || plan.status != PlanStatus::Approved {
      return Err(Error::validation(
        "the weekly plan must be one of your approved plans",
      ));
    }
    if let Some(week) = input.week_check {
      if i64::from(plan.week_number) != week {
        return Err(Error::validation(
          "the weekly plan does not match the selected week",
        ));
      }
    }
  }

  let client = match input.client_id {
    Some(id) => {
      let client = load_client(uow, id)?;
      require_owner(actor, client.rep_id, "client")?;
      Some(client)
    }
    None => None,
  };

  let explicit_week = input.week_number.map(WeekNumber::new).transpose()?;

  let visit_date = input
    .visit_date
    .or(existing.as_ref().map(|v| v.visit_date))
    .or(input.actual_datetime.map(|at| at.date_naive()))
    .ok_or_else(|| {
      Error::validation("visit_date or actual_datetime is required")
    })?;

  let mut visit = existing
    .clone()
    .unwrap_or_else(|| DailyVisit::new(rep_id, visit_date, now));
  visit.rep_id = rep_id;
  input.apply_to(&mut visit);
  visit.weekly_plan_id = plan_id;
  visit.week_number = explicit_week
    .or(plan.as_ref().map(|p| p.week_number))
    .or(visit.week_number);
  if let Some(client) = &client {
    visit.client_id = Some(client.client_id);
    visit.fill_from_client(client);
  }
  visit.updated_at = now;

  match &existing {
    None => {
      visit.last_change = audit_line(now, &format!("{} created", actor.username));
      visit.visit_id = uow.insert_visit(&visit)?;
      info!(visit_id = visit.visit_id, rep_id, "visit created");
    }
    Some(before) => {
      let diffs = visit.changes_since(before);
      if !diffs.is_empty() {
        visit.last_change = audit_line(
          now,
          &format!("{} edited | {}", actor.username, diffs.join("; ")),
        );
      }
      uow.update_visit(&visit)?;
    }
  }

  let event = DomainEvent::VisitSaved {
    visit_id:          visit.visit_id,
    archive_requested: input.archive_requested(),
  };
  let cascade = event::dispatch(uow, actor, event, now)?;
  if cascade.visits_archived > 0 || cascade.plan_archived {
    return load_visit(uow, visit.visit_id);
  }
  Ok(visit)
}

/// Archive a visit explicitly and cascade to its plan.
pub fn archive_visit<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  id: VisitId,
  now: DateTime<Utc>,
) -> Result<DailyVisit> {
  let mut visit = load_visit(uow, id)?;
  require_owner(actor, visit.rep_id, "visit")?;
  archival::cascade_archive_visit(uow, actor, &mut visit, "archived", now)?;
  Ok(visit)
}

// ─── Clients ─────────────────────────────────────────────────────────────────

/// Create or update a client.
///
/// A new client may fold in one of its rep's active, client-less visits: the
/// visit is linked, lends the client its week if none was given, and is
/// archived, and the week's snapshot counts one more visit and client. New
/// clients are archived on creation. Every save then runs the client-save
/// cascade over the client's week.
pub fn save_client<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  input: ClientInput,
  now: DateTime<Utc>,
) -> Result<Client> {
  let existing = match input.client_id {
    Some(id) => {
      let client = load_client(uow, id)?;
      require_owner(actor, client.rep_id, "client")?;
      Some(client)
    }
    None => None,
  };
  let rep_id =
    assigned_rep(uow, actor, input.rep_id, existing.as_ref().map(|c| c.rep_id))?;

  let folded = match (&existing, input.daily_visit_id) {
    (None, Some(visit_id)) => {
      let visit = load_visit(uow, visit_id)?;
      if visit.rep_id != rep_id {
        return Err(Error::forbidden("visit belongs to another rep"));
      }
      if !visit.deletion.is_active() {
        return Err(Error::validation(format!("visit {visit_id} is archived")));
      }
      if visit.client_id.is_some() {
        return Err(Error::validation(format!(
          "visit {visit_id} is already linked to a client"
        )));
      }
      Some(visit)
    }
    _ => None,
  };

  let week_number = match input.week_number {
    Some(week) => WeekNumber::new(week)?,
    None => folded
      .as_ref()
      .and_then(|v| v.week_number)
      .or(existing.as_ref().map(|c| c.week_number))
      .ok_or_else(|| Error::validation("a week number is required for clients"))?,
  };

  let client_id = match existing {
    Some(mut client) => {
      input.apply_to(&mut client);
      client.rep_id = rep_id;
      client.week_number = week_number;
      client.updated_at = now;
      uow.update_client(&client)?;
      client.client_id
    }
    None => {
      let mut client = Client {
        client_id: 0,
        rep_id,
        doctor_name: String::new(),
        entity_name: String::new(),
        city: String::new(),
        location: String::new(),
        phone: String::new(),
        email: String::new(),
        status: None,
        notes: String::new(),
        week_number,
        deletion: SoftDelete::default(),
        created_at: now,
        updated_at: now,
      };
      input.apply_to(&mut client);
      client.deletion.archive(Stamp { at: now, by: actor.rep_id });
      client.client_id = uow.insert_client(&client)?;
      info!(client_id = client.client_id, rep_id, week = %week_number, "client created");

      if let Some(mut visit) = folded {
        fold_visit(uow, actor, &mut visit, &client, now)?;
      }
      client.client_id
    }
  };

  event::dispatch(uow, actor, DomainEvent::ClientSaved { client_id }, now)?;
  load_client(uow, client_id)
}

fn fold_visit<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  visit: &mut DailyVisit,
  client: &Client,
  now: DateTime<Utc>,
) -> Result<()> {
  visit.client_id = Some(client.client_id);
  if visit.week_number.is_none() {
    visit.week_number = Some(client.week_number);
  }
  visit.deletion.archive(Stamp { at: now, by: actor.rep_id });
  visit.last_change =
    audit_line(now, &format!("{} converted to client", actor.username));
  visit.updated_at = now;
  uow.update_visit(visit)?;

  let _ = best_effort(uow, "count converted visit", |uow| {
    let seed = match uow.earliest_approved_plan(client.rep_id, client.week_number)? {
      Some(plan) => SnapshotDetails::from_plan(&plan, PlanStatus::Approved.label()),
      None => SnapshotDetails::labelled(PlanStatus::Approved.label()),
    };
    archival::increment_counters(
      uow,
      client.rep_id,
      client.week_number,
      Counters::new(1, 1),
      || seed,
      now,
    )
  })?;
  info!(visit_id = visit.visit_id, client_id = client.client_id, "visit folded into client");
  Ok(())
}

pub fn archive_client<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  id: i64,
  now: DateTime<Utc>,
) -> Result<Client> {
  let mut client = load_client(uow, id)?;
  require_owner(actor, client.rep_id, "client")?;
  if client.deletion.archive(Stamp { at: now, by: actor.rep_id }) {
    client.updated_at = now;
    uow.update_client(&client)?;
    info!(client_id = id, "client archived");
  }
  Ok(client)
}

/// Archive a client, plan, and visit with one shared stamp.
///
/// Reps may only finalize their own plan and visit. No snapshot is written;
/// the week's row already exists from approval.
pub fn finalize_triplet<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  request: FinalizeRequest,
  now: DateTime<Utc>,
) -> Result<Finalized> {
  let (Some(client_id), Some(plan_id), Some(visit_id)) =
    (request.client_id, request.plan_id, request.visit_id)
  else {
    return Err(Error::validation(
      "client_id, plan_id and visit_id are all required",
    ));
  };

  let mut client = load_client(uow, client_id)?;
  let mut plan = load_plan(uow, plan_id)?;
  let mut visit = load_visit(uow, visit_id)?;

  if !actor.is_manager()
    && (plan.rep_id != actor.rep_id || visit.rep_id != actor.rep_id)
  {
    return Err(Error::forbidden(
      "reps may only finalize their own plan and visit",
    ));
  }

  let stamp = Stamp { at: now, by: actor.rep_id };
  client.deletion.stamp(stamp);
  client.updated_at = now;
  plan.deletion.stamp(stamp);
  plan.updated_at = now;
  visit.deletion.stamp(stamp);
  visit.last_change = audit_line(now, &format!("{} finalized", actor.username));
  visit.updated_at = now;

  uow.update_client(&client)?;
  uow.update_plan(&plan)?;
  uow.update_visit(&visit)?;

  info!(client_id, plan_id, visit_id, by = %actor.username, "triplet finalized");
  Ok(Finalized { client, plan, visit })
}

// ─── Archive maintenance ─────────────────────────────────────────────────────

pub fn merge_week<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  rep_id: RepId,
  week: i64,
) -> Result<MergeReport> {
  require_manager(actor, "merge archive rows")?;
  let week_number = WeekNumber::new(week)?;
  archival::merge_duplicates(uow, rep_id, week_number)
}

/// Upsert a snapshot for every `(rep, week)` with an approved plan, copying
/// details from the earliest planned approved plan. Counters are left alone
/// apart from folding duplicates.
pub fn sync_archives<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  now: DateTime<Utc>,
) -> Result<SyncReport> {
  require_manager(actor, "sync archives")?;
  let mut report = SyncReport::default();

  for (rep_id, week_number) in uow.approved_plan_keys()? {
    let Some(plan) = uow.earliest_approved_plan(rep_id, week_number)? else {
      continue;
    };
    let outcome = best_effort(uow, "sync snapshot", |uow| {
      let merged = archival::merge_duplicates(uow, rep_id, week_number)?;
      let details = SnapshotDetails::from_plan(&plan, PlanStatus::Approved.label());
      let (_, created) =
        archival::upsert_snapshot(uow, rep_id, week_number, details, now)?;
      Ok((created, merged.removed.len() as u32))
    })?;
    match outcome {
      Ok((true, merged)) => {
        report.created += 1;
        report.merged += merged;
      }
      Ok((false, merged)) => {
        report.touched += 1;
        report.merged += merged;
      }
      Err(_) => {}
    }
  }

  info!(
    created = report.created,
    touched = report.touched,
    merged = report.merged,
    "archives synced"
  );
  Ok(report)
}
