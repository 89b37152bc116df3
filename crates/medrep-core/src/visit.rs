//! Daily visits: field visits logged by a rep, normally one per approved
//! weekly plan.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  client::{Client, ClientId},
  lifecycle::SoftDelete,
  plan::{PlanId, WeekNumber, WeeklyPlan},
  rep::RepId,
};

pub type VisitId = i64;

/// Status values (after trimming and lower-casing) that mean the visit is
/// finished. Includes the Arabic terms reps type in the field.
pub const DONE_TOKENS: &[&str] = &[
  "done", "completed", "finished", "closed", "visited", "success", "ok", "تم",
  "منجز", "منتهي", "مكتمل",
];

/// Whether a free-text visit status counts as terminal.
pub fn is_terminal_status(status: &str) -> bool {
  let normalized = status.trim().to_lowercase();
  !normalized.is_empty() && DONE_TOKENS.contains(&normalized.as_str())
}

// ─── Visit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVisit {
  pub visit_id:        VisitId,
  pub rep_id:          RepId,
  pub weekly_plan_id:  Option<PlanId>,
  pub client_id:       Option<ClientId>,
  pub visit_date:      NaiveDate,
  pub actual_datetime: Option<DateTime<Utc>>,
  pub time_shift:      String,
  pub entity:          String,
  pub address:         String,
  pub city:            String,
  pub phone:           String,
  pub client_doctor:   String,
  pub visit_status:    String,
  pub visit_objective: String,
  pub other_objective: String,
  pub week_number:     Option<WeekNumber>,
  #[serde(flatten)]
  pub deletion:        SoftDelete,
  /// Human-readable note describing the most recent change.
  pub last_change:     String,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl DailyVisit {
  /// An empty, active visit for `rep_id` on `visit_date`.
  pub fn new(rep_id: RepId, visit_date: NaiveDate, now: DateTime<Utc>) -> Self {
    DailyVisit {
      visit_id: 0,
      rep_id,
      weekly_plan_id: None,
      client_id: None,
      visit_date,
      actual_datetime: None,
      time_shift: String::new(),
      entity: String::new(),
      address: String::new(),
      city: String::new(),
      phone: String::new(),
      client_doctor: String::new(),
      visit_status: String::new(),
      visit_objective: String::new(),
      other_objective: String::new(),
      week_number: None,
      deletion: SoftDelete::default(),
      last_change: String::new(),
      created_at: now,
      updated_at: now,
    }
  }

  /// The visit a rep starts from an approved plan, pre-filled from it.
  pub fn from_plan(plan: &WeeklyPlan, now: DateTime<Utc>) -> Self {
    let address = plan.details.entity_address.trim();
    DailyVisit {
      weekly_plan_id: Some(plan.plan_id),
      week_number: Some(plan.week_number),
      entity: if address.is_empty() { "—".to_owned() } else { address.to_owned() },
      address: address.to_owned(),
      visit_objective: plan.details.visit_objective.clone(),
      other_objective: plan.details.other_objective.clone(),
      ..DailyVisit::new(plan.rep_id, plan.planned_date, now)
    }
  }

  pub fn is_terminal(&self) -> bool { is_terminal_status(&self.visit_status) }

  /// Fill blank contact fields from the linked client.
  pub fn fill_from_client(&mut self, client: &Client) {
    fn fill(slot: &mut String, value: &str) {
      if slot.is_empty() && !value.is_empty() {
        *slot = value.to_owned();
      }
    }
    fill(&mut self.entity, &client.entity_name);
    fill(&mut self.address, &client.location);
    fill(&mut self.city, &client.city);
    fill(&mut self.phone, &client.phone);
    fill(&mut self.client_doctor, &client.doctor_name);
  }

  /// Describe user-visible field changes relative to `before`, one
  /// `"Label: old → new"` entry per changed field.
  pub fn changes_since(&self, before: &DailyVisit) -> Vec<String> {
    fn show<T: ToString>(v: &Option<T>) -> String {
      v.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    let pairs: [(&str, String, String); 10] = [
      ("Visited Account", before.entity.clone(), self.entity.clone()),
      (
        "Actual DateTime",
        show(&before.actual_datetime),
        show(&self.actual_datetime),
      ),
      ("Time Shift", before.time_shift.clone(), self.time_shift.clone()),
      ("Phone", before.phone.clone(), self.phone.clone()),
      (
        "Visit Objective",
        before.visit_objective.clone(),
        self.visit_objective.clone(),
      ),
      (
        "Other Objective",
        before.other_objective.clone(),
        self.other_objective.clone(),
      ),
      ("Visit Status", before.visit_status.clone(), self.visit_status.clone()),
      (
        "Weekly Plan",
        show(&before.weekly_plan_id),
        show(&self.weekly_plan_id),
      ),
      (
        "Client (Doctor)",
        before.client_doctor.clone(),
        self.client_doctor.clone(),
      ),
      ("City", before.city.clone(), self.city.clone()),
    ];

    pairs
      .into_iter()
      .filter(|(_, old, new)| old != new)
      .map(|(label, old, new)| {
        let old = if old.is_empty() { "—".to_owned() } else { old };
        let new = if new.is_empty() { "—".to_owned() } else { new };
        format!("{label}: {old} → {new}")
      })
      .collect()
  }
}

// ─── Save request ────────────────────────────────────────────────────────────

/// Create-or-update request for [`crate::workflow::save_visit`].
///
/// `None` leaves an existing visit's field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisitInput {
  pub visit_id:        Option<VisitId>,
  /// Managers may assign the visit to a rep; ignored for reps.
  pub rep_id:          Option<RepId>,
  pub weekly_plan_id:  Option<PlanId>,
  pub client_id:       Option<ClientId>,
  pub visit_date:      Option<NaiveDate>,
  pub actual_datetime: Option<DateTime<Utc>>,
  pub time_shift:      Option<String>,
  pub entity:          Option<String>,
  pub address:         Option<String>,
  pub city:            Option<String>,
  pub phone:           Option<String>,
  pub client_doctor:   Option<String>,
  pub visit_status:    Option<String>,
  pub visit_objective: Option<String>,
  pub other_objective: Option<String>,
  pub week_number:     Option<i64>,
  /// Week the caller believes the plan belongs to; rejected on mismatch.
  pub week_check:      Option<i64>,
  /// Archive the visit after saving regardless of its status.
  pub archive:         bool,
  pub mark_done:       bool,
}

impl VisitInput {
  pub fn archive_requested(&self) -> bool { self.archive || self.mark_done }

  /// Copy the provided descriptive fields onto `visit`.
  pub fn apply_to(&self, visit: &mut DailyVisit) {
    fn set(slot: &mut String, value: &Option<String>) {
      if let Some(v) = value {
        *slot = v.trim().to_owned();
      }
    }
    set(&mut visit.time_shift, &self.time_shift);
    set(&mut visit.entity, &self.entity);
    set(&mut visit.address, &self.address);
    set(&mut visit.city, &self.city);
    set(&mut visit.phone, &self.phone);
    set(&mut visit.client_doctor, &self.client_doctor);
    set(&mut visit.visit_status, &self.visit_status);
    set(&mut visit.visit_objective, &self.visit_objective);
    set(&mut visit.other_objective, &self.other_objective);

    if let Some(at) = self.actual_datetime {
      visit.actual_datetime = Some(at);
    }
    if let Some(date) = self.visit_date {
      visit.visit_date = date;
    }
    if self.weekly_plan_id.is_some() {
      visit.weekly_plan_id = self.weekly_plan_id;
    }
  }
}
