//! Role and access policy.
//!
//! Two layers: a static table of which roles may attempt each [`Operation`], and an
//! [`AccessScope`] describing which records the actor is attached to (patient profile, doctor
//! profile, managed hospitals, pharmacy, lab). Detail operations fail hard when a scope check
//! fails; list operations use the scope as a filter.

use crate::identity::Actor;
use crate::model::{Appointment, Patient, Role};
use crate::store::Tables;
use crate::{CareError, CareResult};
use carelink_ids::RecordId;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Every role-gated operation exposed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RequestAppointment,
    EditAppointmentDetails,
    ViewAppointments,
    ReviewAppointment,
    AssignAppointment,
    ConfirmAppointment,
    RescheduleAppointment,
    CancelAppointment,
    UpdateVisitStatus,
    OperationsQueue,
    PatientAppointments,
    DoctorAppointments,
    RegisterWalkIn,
    CallNextInQueue,
    ViewQueue,
    CreatePrescription,
    ViewPrescriptions,
    PatientPrescriptions,
    CreatePharmacyOrder,
    UpdatePharmacyOrder,
    CreateLabRequest,
    UpdateLabRequest,
    UploadLabReport,
    RecordVisit,
    RecordVitals,
    ViewMedicalHistory,
    CreatePayment,
    ProcessPayment,
    IssuePaymentInvoice,
    Administer,
    StockMedicine,
}

const ALL_ROLES: &[Role] = Role::ALL;
const OPERATIONS: &[Role] = &[Role::OperationsManager];
const PATIENT: &[Role] = &[Role::Patient];
const DOCTOR: &[Role] = &[Role::Doctor];
const SUPER_ADMIN: &[Role] = &[Role::SuperAdmin];
const PHARMACY_ADMIN: &[Role] = &[Role::PharmacyAdmin];
const LAB_ADMIN: &[Role] = &[Role::LabAdmin];

/// Roles permitted to attempt `op`. Record-level scoping is checked separately.
pub fn allowed_roles(op: Operation) -> &'static [Role] {
    use Operation::*;
    match op {
        RequestAppointment | EditAppointmentDetails | PatientAppointments
        | PatientPrescriptions => PATIENT,
        ReviewAppointment | AssignAppointment | ConfirmAppointment | RescheduleAppointment
        | CancelAppointment | OperationsQueue | RegisterWalkIn | CallNextInQueue => OPERATIONS,
        UpdateVisitStatus | DoctorAppointments | CreatePrescription | RecordVisit => DOCTOR,
        ViewQueue => &[
            Role::OperationsManager,
            Role::HospitalAdmin,
            Role::HospitalDirector,
            Role::Doctor,
        ],
        CreatePharmacyOrder => &[Role::Patient, Role::PharmacyAdmin],
        UpdatePharmacyOrder => PHARMACY_ADMIN,
        CreateLabRequest => &[Role::Patient, Role::LabAdmin],
        UpdateLabRequest | UploadLabReport => LAB_ADMIN,
        RecordVitals => &[Role::Nurse, Role::MedicalAssistant],
        ViewMedicalHistory => &[
            Role::Patient,
            Role::Doctor,
            Role::Nurse,
            Role::MedicalAssistant,
            Role::HospitalAdmin,
            Role::HospitalDirector,
            Role::SuperAdmin,
        ],
        CreatePayment => &[Role::Patient, Role::Caregiver],
        ViewAppointments | ViewPrescriptions | ProcessPayment | IssuePaymentInvoice => ALL_ROLES,
        Administer => SUPER_ADMIN,
        StockMedicine => &[Role::SuperAdmin, Role::PharmacyAdmin],
    }
}

/// Fails with [`CareError::Permission`] unless the actor's role may attempt `op`.
pub fn authorize(actor: &Actor, op: Operation) -> CareResult<()> {
    if allowed_roles(op).contains(&actor.role) {
        return Ok(());
    }
    tracing::warn!(user = %actor.user_id, role = %actor.role, ?op, "operation denied by role");
    Err(CareError::permission(format!(
        "role {} may not perform {:?}",
        actor.role, op
    )))
}

/// The records an actor is attached to, resolved from the store.
#[derive(Debug, Clone, Default)]
pub struct AccessScope {
    pub user: Option<RecordId>,
    pub role: Option<Role>,
    pub patient: Option<RecordId>,
    pub doctor: Option<RecordId>,
    /// Hospitals whose operations manager is this actor.
    pub managed_hospitals: BTreeSet<RecordId>,
    /// Hospitals the actor works at in any capacity.
    pub staff_hospitals: BTreeSet<RecordId>,
    pub pharmacy: Option<RecordId>,
    pub lab: Option<RecordId>,
}

impl AccessScope {
    pub fn resolve(tables: &Tables, actor: &Actor) -> Self {
        let user = actor.user_id;
        let doctor = tables.doctor_for_user(user);

        let managed_hospitals = tables
            .hospitals
            .values()
            .filter(|h| h.operations_manager == Some(user))
            .map(|h| h.id)
            .collect();
        let mut staff_hospitals: BTreeSet<RecordId> = tables
            .hospitals
            .values()
            .filter(|h| h.is_staffed_by(user))
            .map(|h| h.id)
            .collect();
        if let Some(d) = doctor {
            staff_hospitals.insert(d.hospital);
        }

        Self {
            user: Some(user),
            role: Some(actor.role),
            patient: tables.patient_for_user(user).map(|p| p.id),
            doctor: doctor.map(|d| d.id),
            managed_hospitals,
            staff_hospitals,
            pharmacy: tables
                .pharmacies
                .values()
                .find(|p| p.admin == user)
                .map(|p| p.id),
            lab: tables.labs.values().find(|l| l.admin == user).map(|l| l.id),
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Some(Role::SuperAdmin)
    }

    pub fn manages(&self, hospital: RecordId) -> bool {
        self.managed_hospitals.contains(&hospital)
    }

    pub fn require_managed(&self, hospital: RecordId) -> CareResult<()> {
        if self.manages(hospital) {
            Ok(())
        } else {
            Err(CareError::permission(
                "you do not manage this appointment's hospital",
            ))
        }
    }

    /// The actor's doctor id, provided the appointment is assigned to them.
    pub fn require_assigned_doctor(&self, appointment: &Appointment) -> CareResult<RecordId> {
        match self.doctor {
            Some(doctor) if appointment.is_assigned_to(doctor) => Ok(doctor),
            _ => Err(CareError::permission(
                "appointment is not assigned to you",
            )),
        }
    }

    pub fn owns_patient(&self, patient: RecordId) -> bool {
        self.patient == Some(patient)
    }

    pub fn can_view_appointment(&self, appointment: &Appointment) -> bool {
        match self.role {
            Some(Role::SuperAdmin) => true,
            Some(Role::Patient) => self.owns_patient(appointment.patient),
            Some(Role::Doctor) => self
                .doctor
                .is_some_and(|d| appointment.is_assigned_to(d)),
            Some(_) => self.staff_hospitals.contains(&appointment.hospital),
            None => false,
        }
    }
}

/// Returns the user's patient profile id, creating an empty profile on first use.
pub fn ensure_patient_profile(tables: &mut Tables, user: RecordId, now: DateTime<Utc>) -> RecordId {
    if let Some(existing) = tables.patient_for_user(user) {
        return existing.id;
    }
    let profile = Patient::for_user(user, now);
    let id = profile.id;
    tracing::info!(%user, patient = %id, "created patient profile");
    tables.patients.insert(id, profile);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: RecordId::new(),
            role,
            origin: None,
        }
    }

    #[test]
    fn test_only_operations_managers_assign() {
        assert!(authorize(&actor(Role::OperationsManager), Operation::AssignAppointment).is_ok());
        for role in [Role::Patient, Role::Doctor, Role::SuperAdmin, Role::HospitalAdmin] {
            let err = authorize(&actor(role), Operation::AssignAppointment)
                .expect_err("non-operations role must be denied");
            assert!(matches!(err, CareError::Permission(_)));
        }
    }

    #[test]
    fn test_every_operation_allows_some_role() {
        use Operation::*;
        for op in [
            RequestAppointment,
            ViewQueue,
            RecordVitals,
            CreatePayment,
            Administer,
            StockMedicine,
        ] {
            assert!(!allowed_roles(op).is_empty(), "{op:?} has no roles");
        }
        assert_eq!(allowed_roles(ViewAppointments).len(), Role::ALL.len());
    }

    #[test]
    fn test_ensure_patient_profile_is_idempotent() {
        let mut tables = Tables::default();
        let user = RecordId::new();
        let first = ensure_patient_profile(&mut tables, user, Utc::now());
        let second = ensure_patient_profile(&mut tables, user, Utc::now());
        assert_eq!(first, second);
        assert_eq!(tables.patients.len(), 1);
    }

    #[test]
    fn test_empty_scope_sees_nothing() {
        let tables = Tables::default();
        let scope = AccessScope::resolve(&tables, &actor(Role::Patient));
        assert!(scope.patient.is_none());
        assert!(scope.managed_hospitals.is_empty());
        assert!(scope.require_managed(RecordId::new()).is_err());
    }
}
