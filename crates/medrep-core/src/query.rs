//! Read-side filter and report types used by list pages and dashboards.

use serde::{Deserialize, Serialize};

use crate::{plan::PlanStatus, rep::RepId};

/// Which side of the soft-delete partition to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Show {
  #[default]
  Active,
  #[serde(alias = "archived")]
  Deleted,
  All,
}

impl Show {
  /// The `is_deleted` value to match, or `None` for both.
  pub fn is_deleted(self) -> Option<bool> {
    match self {
      Show::Active => Some(false),
      Show::Deleted => Some(true),
      Show::All => None,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlanFilter {
  pub show:   Show,
  /// Free text over plan text, address, objective, and notes.
  pub q:      Option<String>,
  pub week:   Option<i64>,
  pub status: Option<PlanStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisitFilter {
  pub show: Show,
  /// Free text over entity, address, city, doctor, and status.
  pub q:    Option<String>,
  pub week: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientFilter {
  pub show: Show,
  /// Free text over doctor, entity, city, phone, and email.
  pub q:    Option<String>,
  pub week: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotFilter {
  pub q:    Option<String>,
  pub week: Option<i64>,
  pub rep:  Option<RepId>,
}

/// Manager dashboard headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
  pub pending_plans:   u64,
  pub active_visits:   u64,
  pub active_clients:  u64,
  pub snapshots:       u64,
  pub archived_visits: u64,
}

/// Result of [`crate::workflow::sync_archives`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
  /// Keys that had no snapshot row before the sync.
  pub created: u32,
  /// Keys whose existing row was refreshed.
  pub touched: u32,
  /// Duplicate rows removed.
  pub merged:  u32,
}

/// Trim a free-text filter, treating blank as absent.
pub fn needle(q: &Option<String>) -> Option<&str> {
  q.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn show_accepts_archived_alias() {
    let show: Show = serde_json::from_str("\"archived\"").unwrap();
    assert_eq!(show, Show::Deleted);
    assert_eq!(Show::default().is_deleted(), Some(false));
    assert_eq!(Show::All.is_deleted(), None);
  }

  #[test]
  fn blank_needle_is_ignored() {
    assert_eq!(needle(&Some("  ".into())), None);
    assert_eq!(needle(&Some(" cairo ".into())), Some("cairo"));
    assert_eq!(needle(&None), None);
  }
}
