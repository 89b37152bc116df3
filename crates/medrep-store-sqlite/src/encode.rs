//! Encoding and decoding helpers between domain types and the values stored
//! in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`.
//! Enums are stored as their display strings.

use chrono::{DateTime, NaiveDate, Utc};
use medrep_core::{
  auth::Credentials,
  client::{Client, ClientStatus},
  lifecycle::SoftDelete,
  plan::{PlanDetails, PlanStatus, WeekNumber, WeeklyPlan},
  rep::{Actor, Rep, Role},
  snapshot::{ArchiveSnapshot, Counters, SnapshotDetails},
  visit::DailyVisit,
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_week(n: i64) -> Result<WeekNumber> { Ok(WeekNumber::new(n)?) }

fn decode_enum<T: std::str::FromStr>(column: &'static str, s: String) -> Result<T> {
  s.parse()
    .map_err(|_| Error::UnknownValue { column, value: s })
}

/// Soft-delete columns, in `is_deleted, deleted_at, deleted_by` order.
pub struct RawDeletion {
  pub is_deleted: bool,
  pub deleted_at: Option<String>,
  pub deleted_by: Option<i64>,
}

impl RawDeletion {
  pub fn read(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(RawDeletion {
      is_deleted: row.get(at)?,
      deleted_at: row.get(at + 1)?,
      deleted_by: row.get(at + 2)?,
    })
  }

  fn into_soft_delete(self) -> Result<SoftDelete> {
    Ok(SoftDelete {
      is_deleted: self.is_deleted,
      deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
      deleted_by: self.deleted_by,
    })
  }
}

// ─── Reps ────────────────────────────────────────────────────────────────────

pub const REP_COLUMNS: &str = "rep_id, username, role, created_at, password_hash";

pub struct RawRep {
  pub rep_id:        i64,
  pub username:      String,
  pub role:          String,
  pub created_at:    String,
  pub password_hash: String,
}

impl RawRep {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawRep {
      rep_id:        row.get(0)?,
      username:      row.get(1)?,
      role:          row.get(2)?,
      created_at:    row.get(3)?,
      password_hash: row.get(4)?,
    })
  }

  pub fn into_rep(self) -> Result<Rep> {
    Ok(Rep {
      rep_id:     self.rep_id,
      username:   self.username,
      role:       decode_enum::<Role>("role", self.role)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  pub fn into_credentials(self) -> Result<Credentials> {
    let password_hash = self.password_hash.clone();
    let rep = self.into_rep()?;
    Ok(Credentials { actor: Actor::from(&rep), password_hash })
  }
}

// ─── Plans ───────────────────────────────────────────────────────────────────

pub const PLAN_COLUMNS: &str = "plan_id, rep_id, week_number, planned_date, \
  plan_text, product_line, entity_address, entity_type, specialization, \
  visit_objective, other_objective, notes, status, \
  is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct RawPlan {
  pub plan_id:      i64,
  pub rep_id:       i64,
  pub week_number:  i64,
  pub planned_date: String,
  pub details:      PlanDetails,
  pub status:       String,
  pub deletion:     RawDeletion,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawPlan {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawPlan {
      plan_id:      row.get(0)?,
      rep_id:       row.get(1)?,
      week_number:  row.get(2)?,
      planned_date: row.get(3)?,
      details:      PlanDetails {
        plan_text:       row.get(4)?,
        product_line:    row.get(5)?,
        entity_address:  row.get(6)?,
        entity_type:     row.get(7)?,
        specialization:  row.get(8)?,
        visit_objective: row.get(9)?,
        other_objective: row.get(10)?,
        notes:           row.get(11)?,
      },
      status:       row.get(12)?,
      deletion:     RawDeletion::read(row, 13)?,
      created_at:   row.get(16)?,
      updated_at:   row.get(17)?,
    })
  }

  pub fn into_plan(self) -> Result<WeeklyPlan> {
    Ok(WeeklyPlan {
      plan_id:      self.plan_id,
      rep_id:       self.rep_id,
      week_number:  decode_week(self.week_number)?,
      planned_date: decode_date(&self.planned_date)?,
      details:      self.details,
      status:       decode_enum::<PlanStatus>("status", self.status)?,
      deletion:     self.deletion.into_soft_delete()?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Visits ──────────────────────────────────────────────────────────────────

pub const VISIT_COLUMNS: &str = "visit_id, rep_id, weekly_plan_id, client_id, \
  visit_date, actual_datetime, time_shift, entity, address, city, phone, \
  client_doctor, visit_status, visit_objective, other_objective, week_number, \
  is_deleted, deleted_at, deleted_by, last_change, created_at, updated_at";

pub struct RawVisit {
  pub visit_id:        i64,
  pub rep_id:          i64,
  pub weekly_plan_id:  Option<i64>,
  pub client_id:       Option<i64>,
  pub visit_date:      String,
  pub actual_datetime: Option<String>,
  pub text:            [String; 9],
  pub week_number:     Option<i64>,
  pub deletion:        RawDeletion,
  pub last_change:     String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawVisit {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawVisit {
      visit_id:        row.get(0)?,
      rep_id:          row.get(1)?,
      weekly_plan_id:  row.get(2)?,
      client_id:       row.get(3)?,
      visit_date:      row.get(4)?,
      actual_datetime: row.get(5)?,
      text:            [
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
      ],
      week_number:     row.get(15)?,
      deletion:        RawDeletion::read(row, 16)?,
      last_change:     row.get(19)?,
      created_at:      row.get(20)?,
      updated_at:      row.get(21)?,
    })
  }

  pub fn into_visit(self) -> Result<DailyVisit> {
    let [
      time_shift,
      entity,
      address,
      city,
      phone,
      client_doctor,
      visit_status,
      visit_objective,
      other_objective,
    ] = self.text;
    Ok(DailyVisit {
      visit_id: self.visit_id,
      rep_id: self.rep_id,
      weekly_plan_id: self.weekly_plan_id,
      client_id: self.client_id,
      visit_date: decode_date(&self.visit_date)?,
      actual_datetime: self.actual_datetime.as_deref().map(decode_dt).transpose()?,
      time_shift,
      entity,
      address,
      city,
      phone,
      client_doctor,
      visit_status,
      visit_objective,
      other_objective,
      week_number: self.week_number.map(decode_week).transpose()?,
      deletion: self.deletion.into_soft_delete()?,
      last_change: self.last_change,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Clients ─────────────────────────────────────────────────────────────────

pub const CLIENT_COLUMNS: &str = "client_id, rep_id, doctor_name, entity_name, \
  city, location, phone, email, status, notes, week_number, \
  is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct RawClient {
  pub client_id:   i64,
  pub rep_id:      i64,
  pub text:        [String; 6],
  pub status:      Option<String>,
  pub notes:       String,
  pub week_number: i64,
  pub deletion:    RawDeletion,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawClient {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawClient {
      client_id:   row.get(0)?,
      rep_id:      row.get(1)?,
      text:        [
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
      ],
      status:      row.get(8)?,
      notes:       row.get(9)?,
      week_number: row.get(10)?,
      deletion:    RawDeletion::read(row, 11)?,
      created_at:  row.get(14)?,
      updated_at:  row.get(15)?,
    })
  }

  pub fn into_client(self) -> Result<Client> {
    let [doctor_name, entity_name, city, location, phone, email] = self.text;
    Ok(Client {
      client_id: self.client_id,
      rep_id: self.rep_id,
      doctor_name,
      entity_name,
      city,
      location,
      phone,
      email,
      status: self
        .status
        .map(|s| decode_enum::<ClientStatus>("client status", s))
        .transpose()?,
      notes: self.notes,
      week_number: decode_week(self.week_number)?,
      deletion: self.deletion.into_soft_delete()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

pub const SNAPSHOT_COLUMNS: &str = "snapshot_id, rep_id, week_number, \
  planned_date, plan_text, targeted_line, entity_type, specialization, \
  visit_objective, entity_address, notes, status, total_visits, \
  unique_clients, archived_at";

pub struct RawSnapshot {
  pub snapshot_id:    i64,
  pub rep_id:         i64,
  pub week_number:    i64,
  pub planned_date:   Option<String>,
  pub text:           [String; 8],
  pub total_visits:   i64,
  pub unique_clients: i64,
  pub archived_at:    String,
}

impl RawSnapshot {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawSnapshot {
      snapshot_id:    row.get(0)?,
      rep_id:         row.get(1)?,
      week_number:    row.get(2)?,
      planned_date:   row.get(3)?,
      text:           [
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
      ],
      total_visits:   row.get(12)?,
      unique_clients: row.get(13)?,
      archived_at:    row.get(14)?,
    })
  }

  pub fn into_snapshot(self) -> Result<ArchiveSnapshot> {
    let [
      plan_text,
      targeted_line,
      entity_type,
      specialization,
      visit_objective,
      entity_address,
      notes,
      status,
    ] = self.text;
    Ok(ArchiveSnapshot {
      snapshot_id: self.snapshot_id,
      rep_id:      self.rep_id,
      week_number: decode_week(self.week_number)?,
      details:     SnapshotDetails {
        planned_date: self.planned_date.as_deref().map(decode_date).transpose()?,
        plan_text,
        targeted_line,
        entity_type,
        specialization,
        visit_objective,
        entity_address,
        notes,
        status,
      },
      counters:    Counters::new(
        count(self.total_visits),
        count(self.unique_clients),
      ),
      archived_at: decode_dt(&self.archived_at)?,
    })
  }
}

fn count(n: i64) -> u32 { u32::try_from(n.max(0)).unwrap_or(u32::MAX) }
