//! Dynamic `WHERE` clauses for the list endpoints.

use medrep_core::{
  query::{ClientFilter, PlanFilter, Show, SnapshotFilter, VisitFilter, needle},
  rep::RepId,
};
use rusqlite::types::Value;

/// Accumulates `AND`-joined conditions with positional parameters.
#[derive(Default)]
pub struct Where {
  conds:  Vec<String>,
  params: Vec<Value>,
}

impl Where {
  fn push(&mut self, cond: impl FnOnce(usize) -> String, value: Value) {
    self.params.push(value);
    let n = self.params.len();
    self.conds.push(cond(n));
  }

  fn eq(&mut self, column: &str, value: impl Into<Value>) {
    self.push(|n| format!("{column} = ?{n}"), value.into());
  }

  fn owner(&mut self, scope: Option<RepId>) {
    if let Some(rep_id) = scope {
      self.eq("rep_id", rep_id);
    }
  }

  fn show(&mut self, show: Show) {
    if let Some(deleted) = show.is_deleted() {
      self.eq("is_deleted", deleted);
    }
  }

  fn week(&mut self, week: Option<i64>) {
    if let Some(week) = week {
      self.eq("week_number", week);
    }
  }

  /// Case-insensitive substring match over any of `columns`.
  fn text(&mut self, q: &Option<String>, columns: &[&str]) {
    let Some(q) = needle(q) else { return };
    self.push(
      |n| {
        let ors: Vec<String> = columns
          .iter()
          .map(|c| format!("{c} LIKE ?{n} ESCAPE '\\'"))
          .collect();
        format!("({})", ors.join(" OR "))
      },
      Value::Text(format!("%{}%", escape_like(q))),
    );
  }

  pub fn sql(&self) -> String {
    if self.conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", self.conds.join(" AND "))
    }
  }

  pub fn into_params(self) -> Vec<Value> { self.params }
}

fn escape_like(q: &str) -> String {
  q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub fn plans(filter: &PlanFilter, scope: Option<RepId>) -> Where {
  let mut w = Where::default();
  w.owner(scope);
  w.show(filter.show);
  w.week(filter.week);
  if let Some(status) = filter.status {
    w.eq("status", status.to_string());
  }
  w.text(&filter.q, &[
    "plan_text",
    "entity_address",
    "visit_objective",
    "other_objective",
    "notes",
  ]);
  w
}

pub fn visits(filter: &VisitFilter, scope: Option<RepId>) -> Where {
  let mut w = Where::default();
  w.owner(scope);
  w.show(filter.show);
  w.week(filter.week);
  w.text(&filter.q, &[
    "entity",
    "address",
    "city",
    "client_doctor",
    "visit_status",
  ]);
  w
}

pub fn clients(filter: &ClientFilter, scope: Option<RepId>) -> Where {
  let mut w = Where::default();
  w.owner(scope);
  w.show(filter.show);
  w.week(filter.week);
  w.text(&filter.q, &["doctor_name", "entity_name", "city", "phone", "email"]);
  w
}

pub fn snapshots(filter: &SnapshotFilter) -> Where {
  let mut w = Where::default();
  w.owner(filter.rep);
  w.week(filter.week);
  w.text(&filter.q, &[
    "plan_text",
    "targeted_line",
    "entity_address",
    "visit_objective",
    "notes",
  ]);
  w
}
