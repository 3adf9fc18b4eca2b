use carelink_ids::RecordId;
use carelink_types::{Money, NonEmptyText, Percentage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: RecordId,
    pub name: NonEmptyText,
    pub city: String,
    pub state: String,
    /// The operations manager who reviews and assigns this hospital's appointments.
    pub operations_manager: Option<RecordId>,
    pub director: Option<RecordId>,
    pub admin: Option<RecordId>,
    pub opd_open: bool,
    pub emergency_available: bool,
    pub is_active: bool,
    pub is_approved: bool,
    /// Platform's share of consultation fees, in percent.
    pub commission_rate: Percentage,
    pub created_at: DateTime<Utc>,
}

impl Hospital {
    /// True if `user` holds any staff position recorded on the hospital itself.
    pub fn is_staffed_by(&self, user: RecordId) -> bool {
        [self.operations_manager, self.director, self.admin].contains(&Some(user))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: RecordId,
    pub hospital: RecordId,
    pub name: NonEmptyText,
    pub is_active: bool,
}

/// Doctor profile linking a doctor user to one hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: RecordId,
    pub user: RecordId,
    pub hospital: RecordId,
    pub department: Option<RecordId>,
    pub specialization: String,
    pub license_number: String,
    /// Standard fee copied onto appointments that have none when this doctor is assigned.
    pub consultation_fee: Money,
    pub is_active: bool,
    pub is_approved: bool,
}
