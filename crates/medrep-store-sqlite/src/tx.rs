//! [`SqliteTx`]: [`UnitOfWork`] over an open SQLite transaction.

use medrep_core::{
  client::{Client, ClientId},
  plan::{PlanId, WeekNumber, WeeklyPlan},
  rep::{Rep, RepId},
  snapshot::{ArchiveSnapshot, SnapshotId},
  store::UnitOfWork,
  visit::{DailyVisit, VisitId},
};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  Result,
  encode::{
    CLIENT_COLUMNS, PLAN_COLUMNS, REP_COLUMNS, RawClient, RawPlan, RawRep,
    RawSnapshot, RawVisit, SNAPSHOT_COLUMNS, VISIT_COLUMNS, decode_week,
    encode_date, encode_dt,
  },
};

/// Borrowed view of a transaction, handed to workflow functions.
///
/// Callers own the `rusqlite::Transaction` and decide whether to commit.
pub struct SqliteTx<'c> {
  conn:  &'c Connection,
  depth: u32,
}

impl<'c> SqliteTx<'c> {
  pub fn new(conn: &'c Connection) -> Self { SqliteTx { conn, depth: 0 } }

  fn with<T>(
    &self,
    f: impl FnOnce(&Connection) -> Result<T>,
  ) -> medrep_core::Result<T> {
    f(self.conn).map_err(Into::into)
  }

  fn plan_where(&self, clause: &str, p: impl rusqlite::Params) -> Result<Option<WeeklyPlan>> {
    let sql = format!("SELECT {PLAN_COLUMNS} FROM weekly_plans WHERE {clause}");
    self
      .conn
      .query_row(&sql, p, RawPlan::read)
      .optional()?
      .map(RawPlan::into_plan)
      .transpose()
  }
}

fn week(w: WeekNumber) -> i64 { i64::from(w) }

impl UnitOfWork for SqliteTx<'_> {
  // ── Reps ──────────────────────────────────────────────────────────────────

  fn rep(&mut self, id: RepId) -> medrep_core::Result<Option<Rep>> {
    self.with(|conn| {
      conn
        .query_row(
          &format!("SELECT {REP_COLUMNS} FROM reps WHERE rep_id = ?1"),
          params![id],
          RawRep::read,
        )
        .optional()?
        .map(RawRep::into_rep)
        .transpose()
    })
  }

  // ── Plans ─────────────────────────────────────────────────────────────────

  fn plan(&mut self, id: PlanId) -> medrep_core::Result<Option<WeeklyPlan>> {
    self.with(|_| self.plan_where("plan_id = ?1", params![id]))
  }

  fn insert_plan(&mut self, plan: &WeeklyPlan) -> medrep_core::Result<PlanId> {
    self.with(|conn| {
      let d = &plan.details;
      conn.execute(
        "INSERT INTO weekly_plans (
           rep_id, week_number, planned_date, plan_text, product_line,
           entity_address, entity_type, specialization, visit_objective,
           other_objective, notes, status, is_deleted, deleted_at, deleted_by,
           created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
          plan.rep_id,
          week(plan.week_number),
          encode_date(plan.planned_date),
          d.plan_text,
          d.product_line,
          d.entity_address,
          d.entity_type,
          d.specialization,
          d.visit_objective,
          d.other_objective,
          d.notes,
          plan.status.to_string(),
          plan.deletion.is_deleted,
          plan.deletion.deleted_at.map(encode_dt),
          plan.deletion.deleted_by,
          encode_dt(plan.created_at),
          encode_dt(plan.updated_at),
        ],
      )?;
      Ok(conn.last_insert_rowid())
    })
  }

  fn update_plan(&mut self, plan: &WeeklyPlan) -> medrep_core::Result<()> {
    self.with(|conn| {
      let d = &plan.details;
      conn.execute(
        "UPDATE weekly_plans SET
           rep_id = ?2, week_number = ?3, planned_date = ?4, plan_text = ?5,
           product_line = ?6, entity_address = ?7, entity_type = ?8,
           specialization = ?9, visit_objective = ?10, other_objective = ?11,
           notes = ?12, status = ?13, is_deleted = ?14, deleted_at = ?15,
           deleted_by = ?16, updated_at = ?17
         WHERE plan_id = ?1",
        params![
          plan.plan_id,
          plan.rep_id,
          week(plan.week_number),
          encode_date(plan.planned_date),
          d.plan_text,
          d.product_line,
          d.entity_address,
          d.entity_type,
          d.specialization,
          d.visit_objective,
          d.other_objective,
          d.notes,
          plan.status.to_string(),
          plan.deletion.is_deleted,
          plan.deletion.deleted_at.map(encode_dt),
          plan.deletion.deleted_by,
          encode_dt(plan.updated_at),
        ],
      )?;
      Ok(())
    })
  }

  fn latest_active_approved_plan(
    &mut self,
    rep: RepId,
    week_number: WeekNumber,
  ) -> medrep_core::Result<Option<WeeklyPlan>> {
    self.with(|_| {
      self.plan_where(
        "rep_id = ?1 AND week_number = ?2 AND status = 'approved' AND is_deleted = 0
         ORDER BY plan_id DESC LIMIT 1",
        params![rep, week(week_number)],
      )
    })
  }

  fn earliest_approved_plan(
    &mut self,
    rep: RepId,
    week_number: WeekNumber,
  ) -> medrep_core::Result<Option<WeeklyPlan>> {
    self.with(|_| {
      self.plan_where(
        "rep_id = ?1 AND week_number = ?2 AND status = 'approved'
         ORDER BY planned_date ASC, plan_id ASC LIMIT 1",
        params![rep, week(week_number)],
      )
    })
  }

  fn approved_plan_keys(&mut self) -> medrep_core::Result<Vec<(RepId, WeekNumber)>> {
    self.with(|conn| {
      let mut stmt = conn.prepare(
        "SELECT DISTINCT rep_id, week_number FROM weekly_plans
         WHERE status = 'approved'
         ORDER BY rep_id, week_number",
      )?;
      let rows = stmt
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      rows
        .into_iter()
        .map(|(rep, w)| -> Result<_> { Ok((rep, decode_week(w)?)) })
        .collect()
    })
  }

  // ── Visits ────────────────────────────────────────────────────────────────

  fn visit(&mut self, id: VisitId) -> medrep_core::Result<Option<DailyVisit>> {
    self.with(|conn| {
      conn
        .query_row(
          &format!("SELECT {VISIT_COLUMNS} FROM daily_visits WHERE visit_id = ?1"),
          params![id],
          RawVisit::read,
        )
        .optional()?
        .map(RawVisit::into_visit)
        .transpose()
    })
  }

  fn insert_visit(&mut self, v: &DailyVisit) -> medrep_core::Result<VisitId> {
    self.with(|conn| {
      conn.execute(
        "INSERT INTO daily_visits (
           rep_id, weekly_plan_id, client_id, visit_date, actual_datetime,
           time_shift, entity, address, city, phone, client_doctor,
           visit_status, visit_objective, other_objective, week_number,
           is_deleted, deleted_at, deleted_by, last_change, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                   ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
          v.rep_id,
          v.weekly_plan_id,
          v.client_id,
          encode_date(v.visit_date),
          v.actual_datetime.map(encode_dt),
          v.time_shift,
          v.entity,
          v.address,
          v.city,
          v.phone,
          v.client_doctor,
          v.visit_status,
          v.visit_objective,
          v.other_objective,
          v.week_number.map(week),
          v.deletion.is_deleted,
          v.deletion.deleted_at.map(encode_dt),
          v.deletion.deleted_by,
          v.last_change,
          encode_dt(v.created_at),
          encode_dt(v.updated_at),
        ],
      )?;
      Ok(conn.last_insert_rowid())
    })
  }

  fn update_visit(&mut self, v: &DailyVisit) -> medrep_core::Result<()> {
    self.with(|conn| {
      conn.execute(
        "UPDATE daily_visits SET
           rep_id = ?2, weekly_plan_id = ?3, client_id = ?4, visit_date = ?5,
           actual_datetime = ?6, time_shift = ?7, entity = ?8, address = ?9,
           city = ?10, phone = ?11, client_doctor = ?12, visit_status = ?13,
           visit_objective = ?14, other_objective = ?15, week_number = ?16,
           is_deleted = ?17, deleted_at = ?18, deleted_by = ?19,
           last_change = ?20, updated_at = ?21
         WHERE visit_id = ?1",
        params![
          v.visit_id,
          v.rep_id,
          v.weekly_plan_id,
          v.client_id,
          encode_date(v.visit_date),
          v.actual_datetime.map(encode_dt),
          v.time_shift,
          v.entity,
          v.address,
          v.city,
          v.phone,
          v.client_doctor,
          v.visit_status,
          v.visit_objective,
          v.other_objective,
          v.week_number.map(week),
          v.deletion.is_deleted,
          v.deletion.deleted_at.map(encode_dt),
          v.deletion.deleted_by,
          v.last_change,
          encode_dt(v.updated_at),
        ],
      )?;
      Ok(())
    })
  }

  fn visit_for_plan(
    &mut self,
    rep: RepId,
    plan: PlanId,
  ) -> medrep_core::Result<Option<DailyVisit>> {
    self.with(|conn| {
      conn
        .query_row(
          &format!(
            "SELECT {VISIT_COLUMNS} FROM daily_visits
             WHERE rep_id = ?1 AND weekly_plan_id = ?2
             ORDER BY visit_id ASC LIMIT 1"
          ),
          params![rep, plan],
          RawVisit::read,
        )
        .optional()?
        .map(RawVisit::into_visit)
        .transpose()
    })
  }

  fn visits_for_plan(&mut self, plan: PlanId) -> medrep_core::Result<Vec<DailyVisit>> {
    self.with(|conn| {
      let mut stmt = conn.prepare(&format!(
        "SELECT {VISIT_COLUMNS} FROM daily_visits
         WHERE weekly_plan_id = ?1 ORDER BY visit_id ASC"
      ))?;
      let raws = stmt
        .query_map(params![plan], RawVisit::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      raws.into_iter().map(RawVisit::into_visit).collect()
    })
  }

  // ── Clients ───────────────────────────────────────────────────────────────

  fn client(&mut self, id: ClientId) -> medrep_core::Result<Option<Client>> {
    self.with(|conn| {
      conn
        .query_row(
          &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = ?1"),
          params![id],
          RawClient::read,
        )
        .optional()?
        .map(RawClient::into_client)
        .transpose()
    })
  }

  fn insert_client(&mut self, c: &Client) -> medrep_core::Result<ClientId> {
    self.with(|conn| {
      conn.execute(
        "INSERT INTO clients (
           rep_id, doctor_name, entity_name, city, location, phone, email,
           status, notes, week_number, is_deleted, deleted_at, deleted_by,
           created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
          c.rep_id,
          c.doctor_name,
          c.entity_name,
          c.city,
          c.location,
          c.phone,
          c.email,
          c.status.map(|s| s.to_string()),
          c.notes,
          week(c.week_number),
          c.deletion.is_deleted,
          c.deletion.deleted_at.map(encode_dt),
          c.deletion.deleted_by,
          encode_dt(c.created_at),
          encode_dt(c.updated_at),
        ],
      )?;
      Ok(conn.last_insert_rowid())
    })
  }

  fn update_client(&mut self, c: &Client) -> medrep_core::Result<()> {
    self.with(|conn| {
      conn.execute(
        "UPDATE clients SET
           rep_id = ?2, doctor_name = ?3, entity_name = ?4, city = ?5,
           location = ?6, phone = ?7, email = ?8, status = ?9, notes = ?10,
           week_number = ?11, is_deleted = ?12, deleted_at = ?13,
           deleted_by = ?14, updated_at = ?15
         WHERE client_id = ?1",
        params![
          c.client_id,
          c.rep_id,
          c.doctor_name,
          c.entity_name,
          c.city,
          c.location,
          c.phone,
          c.email,
          c.status.map(|s| s.to_string()),
          c.notes,
          week(c.week_number),
          c.deletion.is_deleted,
          c.deletion.deleted_at.map(encode_dt),
          c.deletion.deleted_by,
          encode_dt(c.updated_at),
        ],
      )?;
      Ok(())
    })
  }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  fn snapshots_for(
    &mut self,
    rep: RepId,
    week_number: WeekNumber,
  ) -> medrep_core::Result<Vec<ArchiveSnapshot>> {
    self.with(|conn| {
      let mut stmt = conn.prepare(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM archive_snapshots
         WHERE rep_id = ?1 AND week_number = ?2 ORDER BY snapshot_id ASC"
      ))?;
      let raws = stmt
        .query_map(params![rep, week(week_number)], RawSnapshot::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      raws.into_iter().map(RawSnapshot::into_snapshot).collect()
    })
  }

  fn insert_snapshot(&mut self, s: &ArchiveSnapshot) -> medrep_core::Result<SnapshotId> {
    self.with(|conn| {
      let d = &s.details;
      conn.execute(
        "INSERT INTO archive_snapshots (
           rep_id, week_number, planned_date, plan_text, targeted_line,
           entity_type, specialization, visit_objective, entity_address, notes,
           status, total_visits, unique_clients, archived_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
          s.rep_id,
          week(s.week_number),
          d.planned_date.map(encode_date),
          d.plan_text,
          d.targeted_line,
          d.entity_type,
          d.specialization,
          d.visit_objective,
          d.entity_address,
          d.notes,
          d.status,
          s.counters.total_visits,
          s.counters.unique_clients,
          encode_dt(s.archived_at),
        ],
      )?;
      Ok(conn.last_insert_rowid())
    })
  }

  fn update_snapshot(&mut self, s: &ArchiveSnapshot) -> medrep_core::Result<()> {
    self.with(|conn| {
      let d = &s.details;
      conn.execute(
        "UPDATE archive_snapshots SET
           planned_date = ?2, plan_text = ?3, targeted_line = ?4,
           entity_type = ?5, specialization = ?6, visit_objective = ?7,
           entity_address = ?8, notes = ?9, status = ?10, total_visits = ?11,
           unique_clients = ?12
         WHERE snapshot_id = ?1",
        params![
          s.snapshot_id,
          d.planned_date.map(encode_date),
          d.plan_text,
          d.targeted_line,
          d.entity_type,
          d.specialization,
          d.visit_objective,
          d.entity_address,
          d.notes,
          d.status,
          s.counters.total_visits,
          s.counters.unique_clients,
        ],
      )?;
      Ok(())
    })
  }

  fn delete_snapshot(&mut self, id: SnapshotId) -> medrep_core::Result<()> {
    self.with(|conn| {
      conn.execute("DELETE FROM archive_snapshots WHERE snapshot_id = ?1", params![id])?;
      Ok(())
    })
  }

  // ── Nesting ───────────────────────────────────────────────────────────────

  fn savepoint<T, F>(&mut self, f: F) -> medrep_core::Result<medrep_core::Result<T>>
  where
    F: FnOnce(&mut Self) -> medrep_core::Result<T>,
  {
    self.depth += 1;
    let name = format!("archive_{}", self.depth);
    let opened = self.with(|conn| {
      conn.execute_batch(&format!("SAVEPOINT {name}"))?;
      Ok(())
    });
    if let Err(err) = opened {
      self.depth -= 1;
      return Err(err);
    }

    let outcome = f(self);
    self.depth -= 1;

    let close = match &outcome {
      Ok(_) => format!("RELEASE {name}"),
      Err(_) => format!("ROLLBACK TO {name}; RELEASE {name}"),
    };
    self.with(|conn| {
      conn.execute_batch(&close)?;
      Ok(())
    })?;
    Ok(outcome)
  }
}
