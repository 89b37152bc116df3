//! Role and ownership checks shared by every mutating operation.
//!
//! Authentication itself (who the caller is) happens at the boundary; by the
//! time a workflow runs it holds an [`Actor`].

use crate::{
  Error, Result,
  rep::{Actor, RepId},
};

/// Stored login material for one user.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub actor:         Actor,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

pub fn require_manager(actor: &Actor, action: &str) -> Result<()> {
  if actor.is_manager() {
    Ok(())
  } else {
    Err(Error::forbidden(format!("only managers may {action}")))
  }
}

/// Managers pass unconditionally; reps must own the record.
pub fn require_owner(actor: &Actor, owner: RepId, what: &str) -> Result<()> {
  if actor.is_manager() || actor.rep_id == owner {
    Ok(())
  } else {
    Err(Error::forbidden(format!("{what} belongs to another rep")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rep::Role;

  fn actor(rep_id: RepId, role: Role) -> Actor {
    Actor { rep_id, username: format!("user{rep_id}"), role }
  }

  #[test]
  fn reps_cannot_act_as_managers() {
    let err = require_manager(&actor(1, Role::Rep), "approve plans").unwrap_err();
    assert!(matches!(err, Error::Forbidden(ref m) if m.contains("approve plans")));
    assert!(require_manager(&actor(2, Role::Manager), "approve plans").is_ok());
  }

  #[test]
  fn ownership_is_waived_for_managers() {
    assert!(require_owner(&actor(1, Role::Rep), 1, "visit").is_ok());
    assert!(require_owner(&actor(1, Role::Rep), 2, "visit").is_err());
    assert!(require_owner(&actor(9, Role::Manager), 2, "visit").is_ok());
  }

  #[test]
  fn manager_scope_is_unrestricted() {
    assert_eq!(actor(4, Role::Rep).scope(), Some(4));
    assert_eq!(actor(4, Role::Manager).scope(), None);
  }
}
