use super::AppointmentType;
use carelink_ids::RecordId;
use carelink_types::NonEmptyText;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One visit's clinical documentation. At most one per appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmrRecord {
    pub id: RecordId,
    pub patient: RecordId,
    pub hospital: RecordId,
    pub appointment: RecordId,
    pub doctor: RecordId,
    pub visit_type: AppointmentType,
    pub chief_complaint: NonEmptyText,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub clinical_notes: String,
    /// Most recent vitals taken for this visit.
    pub vitals: Option<RecordId>,
    pub recorded_by: RecordId,
    pub visit_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    pub id: RecordId,
    pub emr: RecordId,
    pub recorded_by: RecordId,
    pub temperature_celsius: Option<Decimal>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

/// Catalog medicine, independent of any pharmacy's stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: RecordId,
    pub name: NonEmptyText,
    pub generic_name: String,
    pub manufacturer: String,
    pub requires_prescription: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: RecordId,
    pub appointment: RecordId,
    pub emr: Option<RecordId>,
    pub patient: RecordId,
    pub doctor: RecordId,
    pub diagnosis: NonEmptyText,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionMedicine {
    pub id: RecordId,
    pub prescription: RecordId,
    /// Position within the prescription, starting at 1.
    pub line: u32,
    pub medicine: RecordId,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestRecommendation {
    pub id: RecordId,
    pub prescription: RecordId,
    pub test_name: NonEmptyText,
    pub description: String,
    pub is_completed: bool,
}
