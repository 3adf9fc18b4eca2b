use carelink_ids::RecordId;
use carelink_types::{Money, NonEmptyText};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an appointment. The permitted edges live in
/// [`crate::workflow::transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Requested,
    Reviewed,
    Assigned,
    Confirmed,
    Rescheduled,
    InProgress,
    Completed,
    Billed,
    Closed,
    Cancelled,
}

wire_enum!(AppointmentStatus {
    Requested => "REQUESTED",
    Reviewed => "REVIEWED",
    Assigned => "ASSIGNED",
    Confirmed => "CONFIRMED",
    Rescheduled => "RESCHEDULED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Billed => "BILLED",
    Closed => "CLOSED",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    Opd,
    TeleConsult,
    Emergency,
    LabTest,
    FollowUp,
    HomeVisit,
}

wire_enum!(AppointmentType {
    Opd => "OPD",
    TeleConsult => "TELE_CONSULT",
    Emergency => "EMERGENCY",
    LabTest => "LAB_TEST",
    FollowUp => "FOLLOW_UP",
    HomeVisit => "HOME_VISIT",
});

impl AppointmentType {
    /// The walk-in queue this visit type joins, if any.
    pub fn queue_type(&self) -> Option<QueueType> {
        match self {
            AppointmentType::Opd => Some(QueueType::Opd),
            AppointmentType::Emergency => Some(QueueType::Emergency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

wire_enum!(Priority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Urgent => "URGENT",
});

/// A scheduled (or walk-in) visit between a patient and a hospital.
///
/// `doctor` is set only by an operations manager. `preferred_doctor` records the patient's
/// request hint and never counts as an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: RecordId,
    pub patient: RecordId,
    pub hospital: RecordId,
    pub department: Option<RecordId>,
    pub doctor: Option<RecordId>,
    pub preferred_doctor: Option<RecordId>,
    pub appointment_type: AppointmentType,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub priority: Priority,
    pub reason: NonEmptyText,
    pub operations_notes: String,
    pub reviewed_by: Option<RecordId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub consultation_fee: Option<Money>,
    pub platform_commission: Money,
    pub is_walk_in: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Appends a line to the operations notes, ignoring blank input.
    pub fn append_operations_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        if !self.operations_notes.is_empty() {
            self.operations_notes.push('\n');
        }
        self.operations_notes.push_str(note);
    }

    pub fn is_assigned_to(&self, doctor: RecordId) -> bool {
        self.doctor == Some(doctor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueType {
    Opd,
    Emergency,
}

wire_enum!(QueueType {
    Opd => "OPD",
    Emergency => "EMERGENCY",
});

/// A walk-in patient's place in a hospital's same-day queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: RecordId,
    pub hospital: RecordId,
    pub queue_type: QueueType,
    pub appointment: RecordId,
    pub queue_date: NaiveDate,
    /// 1-based, sequential per (hospital, queue type, date).
    pub queue_number: u32,
    pub estimated_wait_minutes: u32,
    pub called_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
