use carelink_ids::RecordId;
use carelink_types::{Money, NonEmptyText};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    pub id: RecordId,
    pub admin: RecordId,
    pub name: NonEmptyText,
    pub city: String,
    pub is_active: bool,
    pub is_approved: bool,
}

/// A test offered by a lab, with its price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTest {
    pub id: RecordId,
    pub lab: RecordId,
    pub name: NonEmptyText,
    pub price: Money,
    pub is_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabRequestStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

wire_enum!(LabRequestStatus {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestRequest {
    pub id: RecordId,
    pub recommendation: RecordId,
    pub lab: RecordId,
    pub lab_test: Option<RecordId>,
    pub patient: RecordId,
    pub status: LabRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result document for a lab request. The report itself lives elsewhere; only its reference
/// is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub id: RecordId,
    pub request: RecordId,
    pub report_reference: NonEmptyText,
    pub report_date: NaiveDate,
    pub findings: String,
    pub notes: String,
    pub uploaded_by: RecordId,
    pub uploaded_at: DateTime<Utc>,
}
