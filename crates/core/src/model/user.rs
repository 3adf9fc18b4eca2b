use carelink_ids::RecordId;
use carelink_types::NonEmptyText;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of platform roles. Authorisation is decided against these values only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    HospitalDirector,
    OperationsManager,
    HospitalAdmin,
    Doctor,
    Nurse,
    MedicalAssistant,
    LabAdmin,
    PharmacyAdmin,
    Patient,
    Caregiver,
}

wire_enum!(Role {
    SuperAdmin => "SUPER_ADMIN",
    HospitalDirector => "HOSPITAL_DIRECTOR",
    OperationsManager => "OPERATIONS_MANAGER",
    HospitalAdmin => "HOSPITAL_ADMIN",
    Doctor => "DOCTOR",
    Nurse => "NURSE",
    MedicalAssistant => "MEDICAL_ASSISTANT",
    LabAdmin => "LAB_ADMIN",
    PharmacyAdmin => "PHARMACY_ADMIN",
    Patient => "PATIENT",
    Caregiver => "CAREGIVER",
});

/// A platform account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub email: String,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub phone: Option<String>,
    pub role: Role,
    /// Opaque bearer token resolved by the identity service.
    pub api_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

wire_enum!(Gender {
    Male => "MALE",
    Female => "FEMALE",
    Other => "OTHER",
});

/// Patient profile, one per patient user and not tied to any hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    pub user: RecordId,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// An empty profile for `user`, as created on first use.
    pub fn for_user(user: RecordId, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            user,
            date_of_birth: None,
            gender: None,
            blood_group: None,
            emergency_contact: None,
            allergies: Vec::new(),
            chronic_conditions: Vec::new(),
            created_at: now,
        }
    }
}
