//! The archival engine.
//!
//! Keeps one [`ArchiveSnapshot`] per `(rep, week)` with accurate counters, and
//! soft-deletes finished plans, visits, and clients so they leave the active
//! worklists. Everything here runs inside the caller's [`UnitOfWork`], so a
//! cascade over several rows commits as one.
//!
//! Snapshot bookkeeping is best-effort. A failed snapshot write is rolled
//! back to a savepoint, logged as an [`Error::ArchivalInconsistency`], and
//! reported to the caller as a warning string. The status change or
//! soft-delete that triggered it still commits.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
  EntityKind, Error, Result,
  client::ClientId,
  lifecycle::{Stamp, audit_line},
  plan::{PlanStatus, WeekNumber, WeeklyPlan},
  rep::{Actor, RepId},
  snapshot::{
    ArchiveSnapshot, Counters, LABEL_COMPLETED, MergeReport, SnapshotDetails,
  },
  store::UnitOfWork,
  visit::DailyVisit,
};

/// What a cascade touched.
#[derive(Debug, Clone, Default)]
pub struct Cascade {
  pub visits_archived: u32,
  pub plan_archived:   bool,
  pub client_archived: bool,
  /// The snapshot as left by the cascade, if one was written.
  pub snapshot:        Option<ArchiveSnapshot>,
  /// Downgraded snapshot failures.
  pub warnings:        Vec<String>,
}

impl Cascade {
  pub fn absorb(&mut self, other: Cascade) {
    self.visits_archived += other.visits_archived;
    self.plan_archived |= other.plan_archived;
    self.client_archived |= other.client_archived;
    if other.snapshot.is_some() {
      self.snapshot = other.snapshot;
    }
    self.warnings.extend(other.warnings);
  }

  fn record(&mut self, outcome: Result<ArchiveSnapshot, String>) {
    match outcome {
      Ok(snapshot) => self.snapshot = Some(snapshot),
      Err(warning) => self.warnings.push(warning),
    }
  }
}

// ─── Best-effort wrapper ─────────────────────────────────────────────────────

/// Run `f` in a savepoint and downgrade its failure to a logged warning.
///
/// Only a failure of the savepoint machinery itself is returned as `Err`.
pub fn best_effort<U, T, F>(
  uow: &mut U,
  what: &str,
  f: F,
) -> Result<Result<T, String>>
where
  U: UnitOfWork,
  F: FnOnce(&mut U) -> Result<T>,
{
  match uow.savepoint(f)? {
    Ok(value) => Ok(Ok(value)),
    Err(err) => {
      let inconsistency = Error::ArchivalInconsistency(format!("{what}: {err}"));
      warn!(error = %err, "{inconsistency}");
      Ok(Err(inconsistency.to_string()))
    }
  }
}

// ─── Snapshot primitives ─────────────────────────────────────────────────────

/// Fold duplicate rows for the key into the lowest-id row.
///
/// Counters of the extra rows are summed into the survivor and the extras are
/// deleted. Calling it again once a single row remains changes nothing.
pub fn merge_duplicates<U: UnitOfWork>(
  uow: &mut U,
  rep_id: RepId,
  week_number: WeekNumber,
) -> Result<MergeReport> {
  let mut rows = uow.snapshots_for(rep_id, week_number)?.into_iter();
  let Some(mut canonical) = rows.next() else {
    return Ok(MergeReport { rep_id, week_number, canonical: None, removed: vec![] });
  };

  let mut removed = Vec::new();
  for duplicate in rows {
    canonical.counters += duplicate.counters;
    uow.delete_snapshot(duplicate.snapshot_id)?;
    removed.push(duplicate.snapshot_id);
  }

  if !removed.is_empty() {
    uow.update_snapshot(&canonical)?;
    warn!(
      rep_id,
      week = %week_number,
      canonical = canonical.snapshot_id,
      ?removed,
      "{}",
      Error::ArchivalInconsistency("merged duplicate snapshot rows".into())
    );
  }

  Ok(MergeReport { rep_id, week_number, canonical: Some(canonical), removed })
}

/// Create the key's snapshot, or overwrite its descriptive fields.
///
/// Counters are never changed here; a new row starts at zero. Returns the
/// row and whether it was created.
pub fn upsert_snapshot<U: UnitOfWork>(
  uow: &mut U,
  rep_id: RepId,
  week_number: WeekNumber,
  details: SnapshotDetails,
  now: DateTime<Utc>,
) -> Result<(ArchiveSnapshot, bool)> {
  let report = merge_duplicates(uow, rep_id, week_number)?;
  match report.canonical {
    Some(mut snapshot) => {
      snapshot.details = details;
      uow.update_snapshot(&snapshot)?;
      Ok((snapshot, false))
    }
    None => {
      let mut snapshot = ArchiveSnapshot::new(rep_id, week_number, details, now);
      snapshot.snapshot_id = uow.insert_snapshot(&snapshot)?;
      Ok((snapshot, true))
    }
  }
}

/// Add to the key's counters, creating the row with `seed` details first if
/// none exists.
pub fn increment_counters<U: UnitOfWork>(
  uow: &mut U,
  rep_id: RepId,
  week_number: WeekNumber,
  delta: Counters,
  seed: impl FnOnce() -> SnapshotDetails,
  now: DateTime<Utc>,
) -> Result<ArchiveSnapshot> {
  let report = merge_duplicates(uow, rep_id, week_number)?;
  let mut snapshot = match report.canonical {
    Some(snapshot) => snapshot,
    None => {
      let mut fresh = ArchiveSnapshot::new(rep_id, week_number, seed(), now);
      fresh.snapshot_id = uow.insert_snapshot(&fresh)?;
      fresh
    }
  };
  snapshot.counters += delta;
  uow.update_snapshot(&snapshot)?;
  Ok(snapshot)
}

/// Upsert the plan's snapshot and recount its counters from every visit ever
/// linked to the plan.
pub fn refresh_snapshot<U: UnitOfWork>(
  uow: &mut U,
  plan: &WeeklyPlan,
  label: &str,
  now: DateTime<Utc>,
) -> Result<ArchiveSnapshot> {
  let details = SnapshotDetails::from_plan(plan, label);
  let (mut snapshot, _) =
    upsert_snapshot(uow, plan.rep_id, plan.week_number, details, now)?;
  let visits = uow.visits_for_plan(plan.plan_id)?;
  snapshot.counters = Counters::from_visits(&visits);
  uow.update_snapshot(&snapshot)?;
  merge_duplicates(uow, plan.rep_id, plan.week_number)?;
  Ok(snapshot)
}

// ─── Cascades ────────────────────────────────────────────────────────────────

/// Archive `visit`, then the parent plan once none of its visits remain
/// active, refreshing the week's snapshot.
///
/// The visit is stamped with `actor` and a `"<time> — <user> <reason>"` note
/// unless it was already archived.
pub fn cascade_archive_visit<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  visit: &mut DailyVisit,
  reason: &str,
  now: DateTime<Utc>,
) -> Result<Cascade> {
  let mut cascade = Cascade::default();
  if visit.deletion.archive(Stamp { at: now, by: actor.rep_id }) {
    visit.last_change = audit_line(now, &format!("{} {reason}", actor.username));
    visit.updated_at = now;
    uow.update_visit(visit)?;
    cascade.visits_archived = 1;
    info!(visit_id = visit.visit_id, reason, "visit archived");
  }

  let Some(plan_id) = visit.weekly_plan_id else {
    return Ok(cascade);
  };
  let Some(mut plan) = uow.plan(plan_id)? else {
    debug!(plan_id, "visit points at a missing plan, nothing to cascade");
    return Ok(cascade);
  };

  let visits = uow.visits_for_plan(plan_id)?;
  if visits.iter().any(|v| v.deletion.is_active()) {
    debug!(plan_id, "plan still has active visits");
    return Ok(cascade);
  }

  if plan.deletion.archive(Stamp { at: now, by: actor.rep_id }) {
    plan.updated_at = now;
    uow.update_plan(&plan)?;
    cascade.plan_archived = true;
    info!(plan_id, "plan archived after its last visit");
  }

  let outcome = best_effort(uow, "refresh snapshot after visit archive", |uow| {
    refresh_snapshot(uow, &plan, LABEL_COMPLETED, now)
  })?;
  cascade.record(outcome);
  Ok(cascade)
}

/// Archive the week of a saved client.
///
/// Finds the latest approved plan for the client's `(rep, week)` that is
/// still active. Without one this is a no-op. Otherwise the plan's active
/// visits, the plan, and the client are archived with the rep as `deleted_by`
/// and the snapshot is refreshed.
pub fn cascade_archive_client_save<U: UnitOfWork>(
  uow: &mut U,
  client_id: ClientId,
  now: DateTime<Utc>,
) -> Result<Cascade> {
  let mut client = uow
    .client(client_id)?
    .ok_or_else(|| Error::not_found(EntityKind::Client, client_id))?;
  let rep_id = client.rep_id;
  let stamp = Stamp { at: now, by: rep_id };
  let mut cascade = Cascade::default();

  let Some(mut plan) = uow.latest_active_approved_plan(rep_id, client.week_number)? else {
    debug!(client_id, week = %client.week_number, "no active approved plan for client week");
    return Ok(cascade);
  };

  for mut visit in uow.visits_for_plan(plan.plan_id)? {
    if visit.deletion.archive(stamp) {
      visit.last_change = audit_line(now, "auto-archived via client save");
      visit.updated_at = now;
      uow.update_visit(&visit)?;
      cascade.visits_archived += 1;
    }
  }

  if plan.deletion.archive(stamp) {
    plan.updated_at = now;
    uow.update_plan(&plan)?;
    cascade.plan_archived = true;
  }

  if client.deletion.archive(stamp) {
    client.updated_at = now;
    uow.update_client(&client)?;
    cascade.client_archived = true;
  }

  info!(
    client_id,
    plan_id = plan.plan_id,
    visits = cascade.visits_archived,
    "week archived via client save"
  );

  let label = plan.status.label();
  let outcome = best_effort(uow, "refresh snapshot after client save", |uow| {
    refresh_snapshot(uow, &plan, label, now)
  })?;
  cascade.record(outcome);
  Ok(cascade)
}

/// Snapshot a freshly approved plan with the "Approved" label.
pub fn on_plan_approved<U: UnitOfWork>(
  uow: &mut U,
  plan: &WeeklyPlan,
  now: DateTime<Utc>,
) -> Result<Cascade> {
  let mut cascade = Cascade::default();
  if plan.status != PlanStatus::Approved {
    return Ok(cascade);
  }
  let outcome = best_effort(uow, "snapshot on approval", |uow| {
    let details = SnapshotDetails::from_plan(plan, PlanStatus::Approved.label());
    let (snapshot, created) =
      upsert_snapshot(uow, plan.rep_id, plan.week_number, details, now)?;
    merge_duplicates(uow, plan.rep_id, plan.week_number)?;
    info!(
      plan_id = plan.plan_id,
      snapshot_id = snapshot.snapshot_id,
      created,
      "approval snapshot written"
    );
    Ok(snapshot)
  })?;
  cascade.record(outcome);
  Ok(cascade)
}

/// Archive a saved visit when asked to, or when its status is terminal.
pub fn on_visit_saved<U: UnitOfWork>(
  uow: &mut U,
  actor: &Actor,
  visit: &mut DailyVisit,
  archive_requested: bool,
  now: DateTime<Utc>,
) -> Result<Cascade> {
  if archive_requested || visit.is_terminal() {
    cascade_archive_visit(uow, actor, visit, "auto-archived via save", now)
  } else {
    Ok(Cascade::default())
  }
}
