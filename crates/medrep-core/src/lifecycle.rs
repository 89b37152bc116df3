//! Soft-delete state and audit stamps shared by plans, visits, and clients.
//!
//! Nothing in the active worklists is ever physically removed. Archival sets
//! `is_deleted` together with who did it and when; the row stays queryable
//! through the `show=deleted` and `show=all` views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rep::RepId;

/// Who archived something, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
  pub at: DateTime<Utc>,
  pub by: RepId,
}

/// The soft-delete columns carried by every worklist entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDelete {
  pub is_deleted: bool,
  pub deleted_at: Option<DateTime<Utc>>,
  pub deleted_by: Option<RepId>,
}

impl SoftDelete {
  pub fn is_active(&self) -> bool { !self.is_deleted }

  /// Archive if still active. Returns `false` and keeps the original stamp
  /// when the row was already archived.
  pub fn archive(&mut self, stamp: Stamp) -> bool {
    if self.is_deleted {
      return false;
    }
    self.stamp(stamp);
    true
  }

  /// Archive unconditionally, overwriting any earlier stamp.
  pub fn stamp(&mut self, stamp: Stamp) {
    self.is_deleted = true;
    self.deleted_at = Some(stamp.at);
    self.deleted_by = Some(stamp.by);
  }

  pub fn restore(&mut self) {
    self.is_deleted = false;
    self.deleted_at = None;
    self.deleted_by = None;
  }
}

/// Format a human-readable audit line: `"2026-03-02 09:15 — alice created"`.
pub fn audit_line(at: DateTime<Utc>, what: &str) -> String {
  format!("{} — {what}", at.format("%Y-%m-%d %H:%M"))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, 15, 0).unwrap()
  }

  #[test]
  fn archive_keeps_first_stamp() {
    let mut state = SoftDelete::default();
    assert!(state.archive(Stamp { at: at(9), by: 1 }));
    assert!(!state.archive(Stamp { at: at(10), by: 2 }));
    assert_eq!(state.deleted_at, Some(at(9)));
    assert_eq!(state.deleted_by, Some(1));
  }

  #[test]
  fn stamp_overwrites_and_restore_clears() {
    let mut state = SoftDelete::default();
    state.archive(Stamp { at: at(9), by: 1 });
    state.stamp(Stamp { at: at(11), by: 3 });
    assert_eq!(state.deleted_by, Some(3));

    state.restore();
    assert!(state.is_active());
    assert_eq!(state, SoftDelete::default());
  }

  #[test]
  fn audit_line_format() {
    assert_eq!(audit_line(at(9), "alice created"), "2026-03-02 09:15 — alice created");
  }
}
