//! Clients: doctors and accounts a rep tracks, usually converted from a
//! daily visit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  lifecycle::SoftDelete,
  plan::WeekNumber,
  rep::RepId,
  visit::VisitId,
};

pub type ClientId = i64;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum ClientStatus {
  Potential,
  Active,
  #[serde(rename = "Not Interested")]
  #[strum(serialize = "Not Interested")]
  NotInterested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
  pub client_id:   ClientId,
  pub rep_id:      RepId,
  pub doctor_name: String,
  pub entity_name: String,
  pub city:        String,
  pub location:    String,
  pub phone:       String,
  pub email:       String,
  pub status:      Option<ClientStatus>,
  pub notes:       String,
  /// Every client belongs to a week; it is what ties it to the archive.
  pub week_number: WeekNumber,
  #[serde(flatten)]
  pub deletion:    SoftDelete,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Create-or-update request for [`crate::workflow::save_client`].
///
/// `None` fields leave an existing client untouched; on creation they
/// default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientInput {
  pub client_id:      Option<ClientId>,
  /// Managers may assign the client to a rep; ignored for reps.
  pub rep_id:         Option<RepId>,
  /// An active visit with no client yet, folded into this client on save.
  pub daily_visit_id: Option<VisitId>,
  pub doctor_name:    Option<String>,
  pub entity_name:    Option<String>,
  pub city:           Option<String>,
  pub location:       Option<String>,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub status:         Option<ClientStatus>,
  pub notes:          Option<String>,
  /// Raw week; inherited from the folded visit when absent.
  pub week_number:    Option<i64>,
}

impl ClientInput {
  /// Copy the provided descriptive fields onto `client`, trimmed.
  pub fn apply_to(&self, client: &mut Client) {
    fn set(slot: &mut String, value: &Option<String>) {
      if let Some(v) = value {
        *slot = v.trim().to_owned();
      }
    }
    set(&mut client.doctor_name, &self.doctor_name);
    set(&mut client.entity_name, &self.entity_name);
    set(&mut client.city, &self.city);
    set(&mut client.location, &self.location);
    set(&mut client.phone, &self.phone);
    set(&mut client.email, &self.email);
    set(&mut client.notes, &self.notes);
    if self.status.is_some() {
      client.status = self.status;
    }
  }
}
