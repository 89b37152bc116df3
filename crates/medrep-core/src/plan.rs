//! Weekly plans: a rep's proposed activity for one week, subject to manager
//! approval.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  lifecycle::SoftDelete,
  rep::RepId,
};

pub type PlanId = i64;

/// The objective value that requires a free-text `other_objective`.
pub const OTHER_OBJECTIVE: &str = "Other";

// ─── Week number ─────────────────────────────────────────────────────────────

/// An ISO-style week number in `1..=53`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct WeekNumber(u8);

impl WeekNumber {
  pub const MAX: u8 = 53;
  pub const MIN: u8 = 1;

  pub fn new(week: i64) -> Result<Self> {
    if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&week) {
      Ok(Self(week as u8))
    } else {
      Err(Error::validation(format!(
        "week number must be between {} and {}, got {week}",
        Self::MIN,
        Self::MAX
      )))
    }
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<i64> for WeekNumber {
  type Error = Error;

  fn try_from(week: i64) -> Result<Self> { Self::new(week) }
}

impl From<WeekNumber> for i64 {
  fn from(week: WeekNumber) -> Self { i64::from(week.0) }
}

impl fmt::Display for WeekNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl PlanStatus {
  /// Display label, as copied into archive snapshots.
  pub fn label(self) -> &'static str {
    match self {
      Self::Pending => "Pending",
      Self::Approved => "Approved",
      Self::Rejected => "Rejected",
    }
  }

  /// Check a manager decision against the current status.
  ///
  /// Only pending plans can be decided. Repeating the decision a plan already
  /// carries is accepted and reported as `Ok(false)` (nothing to change).
  pub fn decide(self, to: PlanStatus) -> Result<bool> {
    match (self, to) {
      (from, to) if from == to => Ok(false),
      (Self::Pending, _) => Ok(true),
      (from, to) => {
        Err(Error::validation(format!("a {from} plan cannot become {to}")))
      }
    }
  }
}

// ─── Descriptive fields ──────────────────────────────────────────────────────

/// Free-text fields describing what the rep intends to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanDetails {
  pub plan_text:       String,
  pub product_line:    String,
  pub entity_address:  String,
  pub entity_type:     String,
  pub specialization:  String,
  pub visit_objective: String,
  /// Only meaningful when `visit_objective` is [`OTHER_OBJECTIVE`].
  pub other_objective: String,
  pub notes:           String,
}

impl PlanDetails {
  /// Trim every field and enforce the "Other" objective rule.
  pub fn normalized(self) -> Result<Self> {
    let visit_objective = self.visit_objective.trim().to_owned();
    let other_objective = if visit_objective == OTHER_OBJECTIVE {
      let other = self.other_objective.trim();
      if other.is_empty() {
        return Err(Error::validation(
          "an \"Other\" objective needs other_objective filled in",
        ));
      }
      other.to_owned()
    } else {
      String::new()
    };

    Ok(PlanDetails {
      plan_text: self.plan_text.trim().to_owned(),
      product_line: self.product_line.trim().to_owned(),
      entity_address: self.entity_address.trim().to_owned(),
      entity_type: self.entity_type.trim().to_owned(),
      specialization: self.specialization.trim().to_owned(),
      visit_objective,
      other_objective,
      notes: self.notes.trim().to_owned(),
    })
  }
}

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPlan {
  pub plan_id:      PlanId,
  pub rep_id:       RepId,
  pub week_number:  WeekNumber,
  pub planned_date: NaiveDate,
  #[serde(flatten)]
  pub details:      PlanDetails,
  pub status:       PlanStatus,
  #[serde(flatten)]
  pub deletion:     SoftDelete,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Input for [`crate::workflow::create_plan`].
///
/// `week_number` is kept raw so an out-of-range value surfaces as a
/// validation failure rather than a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
  /// Managers may file a plan on behalf of a rep; ignored for reps.
  pub rep_id:       Option<RepId>,
  pub week_number:  i64,
  pub planned_date: NaiveDate,
  #[serde(flatten)]
  pub details:      PlanDetails,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn week_bounds() {
    assert!(WeekNumber::new(0).is_err());
    assert!(WeekNumber::new(54).is_err());
    assert!(WeekNumber::new(-3).is_err());
    assert_eq!(WeekNumber::new(1).unwrap().get(), 1);
    assert_eq!(WeekNumber::new(53).unwrap().get(), 53);
  }

  #[test]
  fn week_deserialization_is_checked() {
    let ok: WeekNumber = serde_json::from_str("10").unwrap();
    assert_eq!(ok.get(), 10);
    assert!(serde_json::from_str::<WeekNumber>("54").is_err());
  }

  #[test]
  fn only_pending_plans_are_decided() {
    assert!(PlanStatus::Pending.decide(PlanStatus::Approved).unwrap());
    assert!(PlanStatus::Pending.decide(PlanStatus::Rejected).unwrap());
    assert!(!PlanStatus::Approved.decide(PlanStatus::Approved).unwrap());
    assert!(!PlanStatus::Rejected.decide(PlanStatus::Rejected).unwrap());
    assert!(PlanStatus::Rejected.decide(PlanStatus::Approved).is_err());
    assert!(PlanStatus::Approved.decide(PlanStatus::Rejected).is_err());
  }

  #[test]
  fn other_objective_rule() {
    let details = PlanDetails {
      visit_objective: " Other ".into(),
      ..Default::default()
    };
    assert!(details.clone().normalized().is_err());

    let filled = PlanDetails {
      other_objective: " market survey ".into(),
      ..details
    }
    .normalized()
    .unwrap();
    assert_eq!(filled.visit_objective, "Other");
    assert_eq!(filled.other_objective, "market survey");

    let dropped = PlanDetails {
      visit_objective: "Detailing".into(),
      other_objective: "stale".into(),
      ..Default::default()
    }
    .normalized()
    .unwrap();
    assert!(dropped.other_objective.is_empty());
  }

  #[test]
  fn status_strings() {
    assert_eq!(PlanStatus::Approved.to_string(), "approved");
    assert_eq!("rejected".parse::<PlanStatus>().unwrap(), PlanStatus::Rejected);
    assert_eq!(PlanStatus::Approved.label(), "Approved");
  }
}
