//! Representatives: the users who own plans, visits, and clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub type RepId = i64;

/// The role a user plays in the approval workflow.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Rep,
  Manager,
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rep {
  pub rep_id:     RepId,
  pub username:   String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
}

/// An authenticated caller. Every operation on the store takes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub rep_id:   RepId,
  pub username: String,
  pub role:     Role,
}

impl Actor {
  pub fn is_manager(&self) -> bool { self.role == Role::Manager }

  /// The owner filter applied to reads: managers see every rep's rows.
  pub fn scope(&self) -> Option<RepId> {
    (!self.is_manager()).then_some(self.rep_id)
  }
}

impl From<&Rep> for Actor {
  fn from(rep: &Rep) -> Self {
    Actor {
      rep_id:   rep.rep_id,
      username: rep.username.clone(),
      role:     rep.role,
    }
  }
}
