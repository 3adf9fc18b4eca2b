//! Persistent entity definitions.
//!
//! Every entity is keyed by a [`RecordId`] and stored in one ordered table of
//! [`crate::store::Tables`]. The [`Record`] trait supplies the key and the kind name used in
//! not-found errors.

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum using its wire names.
macro_rules! wire_enum {
    ($ty:ident { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),*
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::CareError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok($ty::$variant),)*
                    other => Err(crate::CareError::validation(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

mod appointment;
mod clinical;
mod hospital;
mod lab;
mod payment;
mod pharmacy;
mod user;

pub use appointment::{
    Appointment, AppointmentStatus, AppointmentType, Priority, QueueEntry, QueueType,
};
pub use clinical::{
    EmrRecord, LabTestRecommendation, Medicine, Prescription, PrescriptionMedicine, VitalsRecord,
};
pub use hospital::{Department, Doctor, Hospital};
pub use lab::{Lab, LabReport, LabRequestStatus, LabTest, LabTestRequest};
pub use payment::{Payment, PaymentInvoice, PaymentMethod, PaymentStatus, PaymentType};
pub use pharmacy::{
    OrderStatus, Pharmacy, PharmacyInvoice, PharmacyMedicine, PharmacyOrder, PharmacyOrderItem,
};
pub use user::{Gender, Patient, Role, User};

use carelink_ids::RecordId;

/// A stored entity with a stable identifier.
pub trait Record {
    /// Human-readable kind, used in not-found errors.
    const KIND: &'static str;

    fn id(&self) -> RecordId;
}

macro_rules! impl_record {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl Record for $ty {
                const KIND: &'static str = $kind;

                fn id(&self) -> RecordId {
                    self.id
                }
            }
        )*
    };
}

impl_record! {
    User => "user",
    Patient => "patient",
    Hospital => "hospital",
    Department => "department",
    Doctor => "doctor",
    Appointment => "appointment",
    QueueEntry => "queue entry",
    EmrRecord => "EMR record",
    VitalsRecord => "vitals record",
    Medicine => "medicine",
    Prescription => "prescription",
    PrescriptionMedicine => "prescription medicine",
    LabTestRecommendation => "lab test recommendation",
    Pharmacy => "pharmacy",
    PharmacyMedicine => "pharmacy stock",
    PharmacyOrder => "pharmacy order",
    PharmacyOrderItem => "pharmacy order item",
    PharmacyInvoice => "pharmacy invoice",
    Lab => "lab",
    LabTest => "lab test",
    LabTestRequest => "lab test request",
    LabReport => "lab report",
    Payment => "payment",
    PaymentInvoice => "payment invoice",
}
