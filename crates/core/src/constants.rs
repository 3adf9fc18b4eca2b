//! Constants used throughout the CareLink core crate.

use rust_decimal::Decimal;

/// Filename of the JSON snapshot written into the data directory.
pub const STORE_SNAPSHOT_FILENAME: &str = "store.json";

/// Filename of the append-only audit log written into the data directory.
pub const AUDIT_LOG_FILENAME: &str = "audit.jsonl";

/// Default listen address for the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Hospital commission rate applied when none is given (5.00%).
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(500, 0, 0, false, 2);

/// Pharmacy invoice tax rate applied when none is configured (18%).
pub const DEFAULT_PHARMACY_TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 0);

/// Minutes each waiting OPD patient adds to the estimated wait.
pub const DEFAULT_OPD_MINUTES_PER_PATIENT: u32 = 10;

/// Minutes each waiting emergency patient adds to the estimated wait.
pub const DEFAULT_EMERGENCY_MINUTES_PER_PATIENT: u32 = 5;

/// Resource type names recorded in audit entries.
pub mod resource {
    pub const APPOINTMENT: &str = "Appointment";
    pub const QUEUE_ENTRY: &str = "AppointmentQueue";
    pub const PRESCRIPTION: &str = "Prescription";
    pub const PHARMACY_ORDER: &str = "PharmacyOrder";
    pub const LAB_REQUEST: &str = "LabTestRequest";
    pub const LAB_REPORT: &str = "LabReport";
    pub const EMR: &str = "EMR";
    pub const VITALS: &str = "Vitals";
    pub const PATIENT: &str = "Patient";
    pub const PAYMENT: &str = "Payment";
    pub const USER: &str = "User";
    pub const HOSPITAL: &str = "Hospital";
}
