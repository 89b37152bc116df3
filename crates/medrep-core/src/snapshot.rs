//! Archive snapshots: the durable record of a completed (rep, week) cycle.
//!
//! A snapshot is keyed by its natural key `(rep_id, week_number)`, never by a
//! plan id: the plan is archived on approval, the snapshot outlives it.
//! Nothing in the store enforces one row per key, so readers and writers
//! reconcile duplicates through [`crate::archival::merge_duplicates`].

use std::ops::AddAssign;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  client::ClientId,
  plan::{WeekNumber, WeeklyPlan},
  rep::RepId,
  visit::DailyVisit,
};

pub type SnapshotId = i64;

/// Status label written when a plan is approved.
pub const LABEL_APPROVED: &str = "Approved";
/// Status label written when the last visit of a plan is archived.
pub const LABEL_COMPLETED: &str = "Completed";

// ─── Counters ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
  pub total_visits:   u32,
  pub unique_clients: u32,
}

impl Counters {
  pub fn new(total_visits: u32, unique_clients: u32) -> Self {
    Counters { total_visits, unique_clients }
  }

  /// Recount from every visit ever linked to a plan, archived or not.
  pub fn from_visits<'a>(visits: impl IntoIterator<Item = &'a DailyVisit>) -> Self {
    let mut total = 0u32;
    let mut clients: Vec<ClientId> = Vec::new();
    for visit in visits {
      total += 1;
      match visit.client_id {
        Some(id) if !clients.contains(&id) => clients.push(id),
        _ => {}
      }
    }
    Counters::new(total, clients.len() as u32)
  }
}

impl AddAssign for Counters {
  fn add_assign(&mut self, rhs: Self) {
    self.total_visits = self.total_visits.saturating_add(rhs.total_visits);
    self.unique_clients = self.unique_clients.saturating_add(rhs.unique_clients);
  }
}

// ─── Descriptive fields ──────────────────────────────────────────────────────

/// Fields copied from the source plan. Overwritten latest-wins on upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDetails {
  pub planned_date:    Option<NaiveDate>,
  pub plan_text:       String,
  pub targeted_line:   String,
  pub entity_type:     String,
  pub specialization:  String,
  pub visit_objective: String,
  pub entity_address:  String,
  pub notes:           String,
  pub status:          String,
}

impl SnapshotDetails {
  pub fn from_plan(plan: &WeeklyPlan, status: &str) -> Self {
    let d = &plan.details;
    let visit_objective = if d.other_objective.is_empty() {
      d.visit_objective.clone()
    } else {
      format!("{}: {}", d.visit_objective, d.other_objective)
    };
    SnapshotDetails {
      planned_date: Some(plan.planned_date),
      plan_text: d.plan_text.clone(),
      targeted_line: d.product_line.clone(),
      entity_type: d.entity_type.clone(),
      specialization: d.specialization.clone(),
      visit_objective,
      entity_address: d.entity_address.clone(),
      notes: d.notes.clone(),
      status: status.to_owned(),
    }
  }

  /// Details for a week with no plan to copy from.
  pub fn labelled(status: &str) -> Self {
    SnapshotDetails { status: status.to_owned(), ..Default::default() }
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
  pub snapshot_id: SnapshotId,
  pub rep_id:      RepId,
  pub week_number: WeekNumber,
  #[serde(flatten)]
  pub details:     SnapshotDetails,
  #[serde(flatten)]
  pub counters:    Counters,
  pub archived_at: DateTime<Utc>,
}

impl ArchiveSnapshot {
  /// A fresh row with zero counters; `snapshot_id` is assigned on insert.
  pub fn new(
    rep_id: RepId,
    week_number: WeekNumber,
    details: SnapshotDetails,
    now: DateTime<Utc>,
  ) -> Self {
    ArchiveSnapshot {
      snapshot_id: 0,
      rep_id,
      week_number,
      details,
      counters: Counters::default(),
      archived_at: now,
    }
  }
}

/// Outcome of reconciling duplicate rows for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
  pub rep_id:      RepId,
  pub week_number: WeekNumber,
  /// The surviving row, if any row exists for the key.
  pub canonical:   Option<ArchiveSnapshot>,
  pub removed:     Vec<SnapshotId>,
}

impl MergeReport {
  pub fn merged(&self) -> bool { !self.removed.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn visit(client_id: Option<ClientId>) -> DailyVisit {
    let mut v = DailyVisit::new(1, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), Utc::now());
    v.client_id = client_id;
    v
  }

  #[test]
  fn recount_counts_distinct_clients() {
    let visits = [visit(Some(4)), visit(Some(4)), visit(None), visit(Some(9))];
    assert_eq!(Counters::from_visits(&visits), Counters::new(4, 2));
    assert_eq!(Counters::from_visits(&visits[..0]), Counters::default());
  }

  #[test]
  fn counters_add() {
    let mut c = Counters::new(3, 1);
    c += Counters::new(5, 2);
    assert_eq!(c, Counters::new(8, 3));
  }

  #[test]
  fn snapshot_serializes_flat() {
    let snap = ArchiveSnapshot::new(
      2,
      WeekNumber::new(10).unwrap(),
      SnapshotDetails::labelled(LABEL_APPROVED),
      Utc::now(),
    );
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["week_number"], 10);
    assert_eq!(json["status"], "Approved");
    assert_eq!(json["total_visits"], 0);
  }
}
