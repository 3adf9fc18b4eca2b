//! Prescriptions written by the assigned doctor at the end of a consultation.

use crate::audit::{appointment_action, AuditEvent};
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{
    AppointmentStatus, LabTestRecommendation, Prescription, PrescriptionMedicine, Role,
};
use crate::notify::{NotificationCategory, NotificationRequest};
use crate::policy::{authorize, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::workflow::transitions::check_transition;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::NonEmptyText;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PrescribedMedicine {
    pub medicine: RecordId,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct RecommendedTest {
    pub test_name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub appointment: RecordId,
    pub diagnosis: String,
    pub notes: String,
    pub medicines: Vec<PrescribedMedicine>,
    pub lab_tests: Vec<RecommendedTest>,
}

/// A prescription with its medicine lines (in line order) and lab recommendations.
#[derive(Debug, Clone, PartialEq)]
pub struct PrescriptionDetail {
    pub prescription: Prescription,
    pub medicines: Vec<PrescriptionMedicine>,
    pub lab_tests: Vec<LabTestRecommendation>,
}

impl PrescriptionDetail {
    fn load(tables: &Tables, prescription: &Prescription) -> Self {
        Self {
            prescription: prescription.clone(),
            medicines: tables
                .prescription_lines(prescription.id)
                .into_iter()
                .cloned()
                .collect(),
            lab_tests: tables
                .lab_recommendations_for(prescription.id)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

fn validate_lines(request: &NewPrescription) -> CareResult<()> {
    let mut seen = BTreeSet::new();
    for line in &request.medicines {
        if !seen.insert(line.medicine) {
            return Err(CareError::validation(format!(
                "medicine {} is listed more than once",
                line.medicine
            )));
        }
        if line.quantity == 0 {
            return Err(CareError::validation("medicine quantity must be at least 1"));
        }
    }
    Ok(())
}

fn can_view(tables: &Tables, scope: &AccessScope, prescription: &Prescription) -> bool {
    match scope.role {
        Some(Role::SuperAdmin) => true,
        Some(Role::Patient) => scope.owns_patient(prescription.patient),
        Some(Role::Doctor) => scope.doctor == Some(prescription.doctor),
        Some(Role::PharmacyAdmin) => scope.pharmacy.is_some_and(|pharmacy| {
            tables
                .pharmacy_orders
                .values()
                .any(|o| o.prescription == prescription.id && o.pharmacy == pharmacy)
        }),
        Some(Role::LabAdmin) => scope.lab.is_some_and(|lab| {
            tables.lab_requests.values().any(|r| {
                r.lab == lab
                    && tables
                        .lab_recommendations
                        .get(&r.recommendation)
                        .is_some_and(|rec| rec.prescription == prescription.id)
            })
        }),
        Some(_) => tables
            .appointments
            .get(&prescription.appointment)
            .is_some_and(|a| scope.manages(a.hospital)),
        None => false,
    }
}

struct Written {
    detail: PrescriptionDetail,
    patient_user: RecordId,
    completed_visit: bool,
}

#[derive(Clone)]
pub struct PrescriptionService {
    ctx: Arc<CoreContext>,
}

impl PrescriptionService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Writes a prescription for an appointment and completes the visit.
    ///
    /// The prescription, its medicine lines, its lab recommendations and the appointment's
    /// move to Completed are committed together or not at all.
    ///
    /// # Errors
    ///
    /// - [`CareError::Permission`] unless the actor is the appointment's assigned doctor.
    /// - [`CareError::StateConflict`] if the appointment is not in a prescribable state or
    ///   already has a prescription.
    /// - [`CareError::Validation`] for a blank diagnosis, an unknown or repeated medicine,
    ///   a zero quantity, or a blank test name.
    pub fn create(&self, actor: &Actor, request: NewPrescription) -> CareResult<PrescriptionDetail> {
        authorize(actor, Operation::CreatePrescription)?;
        let diagnosis = NonEmptyText::new(&request.diagnosis)
            .map_err(|_| CareError::validation("diagnosis is required"))?;
        validate_lines(&request)?;
        let tests = request
            .lab_tests
            .iter()
            .map(|t| {
                NonEmptyText::new(&t.test_name)
                    .map(|name| (name, t.description.trim().to_string()))
                    .map_err(|_| CareError::validation("lab test name is required"))
            })
            .collect::<CareResult<Vec<_>>>()?;
        let now = Utc::now();

        let written = self.ctx.store().transaction(|t| {
            let appt = t.appointments.fetch(request.appointment)?;
            let doctor = AccessScope::resolve(t, actor).require_assigned_doctor(appt)?;
            if !appt.status.accepts_prescription() {
                return Err(CareError::conflict(format!(
                    "cannot prescribe for an appointment that is {}",
                    appt.status
                )));
            }
            if t.prescription_for_appointment(appt.id).is_some() {
                return Err(CareError::conflict("appointment already has a prescription"));
            }
            if let Some(missing) = request
                .medicines
                .iter()
                .find(|line| !t.medicines.contains_key(&line.medicine))
            {
                return Err(CareError::validation(format!(
                    "unknown medicine {}",
                    missing.medicine
                )));
            }

            let prescription = Prescription {
                id: RecordId::new(),
                appointment: appt.id,
                emr: t.emr_for_appointment(appt.id).map(|e| e.id),
                patient: appt.patient,
                doctor,
                diagnosis,
                notes: request.notes.trim().to_string(),
                created_at: now,
            };
            let patient_user = t.patient_user(appt.patient)?;

            for (line, med) in (1..).zip(&request.medicines) {
                t.prescription_medicines.put(PrescriptionMedicine {
                    id: RecordId::new(),
                    prescription: prescription.id,
                    line,
                    medicine: med.medicine,
                    dosage: med.dosage.trim().to_string(),
                    frequency: med.frequency.trim().to_string(),
                    duration: med.duration.trim().to_string(),
                    instructions: med.instructions.trim().to_string(),
                    quantity: med.quantity,
                });
            }
            for (test_name, description) in tests {
                t.lab_recommendations.put(LabTestRecommendation {
                    id: RecordId::new(),
                    prescription: prescription.id,
                    test_name,
                    description,
                    is_completed: false,
                });
            }

            let appt = t.appointments.fetch_mut(request.appointment)?;
            let completed_visit = match appt.status {
                AppointmentStatus::Completed => false,
                AppointmentStatus::InProgress => {
                    check_transition(appt.status, AppointmentStatus::Completed)?;
                    true
                }
                // Assigned or Confirmed: writing the prescription closes out the consultation.
                _ => true,
            };
            if completed_visit {
                appt.status = AppointmentStatus::Completed;
                appt.updated_at = now;
            }

            t.prescriptions.put(prescription.clone());
            Ok(Written {
                detail: PrescriptionDetail::load(t, &prescription),
                patient_user,
                completed_visit,
            })
        })?;

        let prescription = &written.detail.prescription;
        tracing::info!(
            prescription = %prescription.id,
            appointment = %prescription.appointment,
            medicines = written.detail.medicines.len(),
            lab_tests = written.detail.lab_tests.len(),
            "prescription created"
        );
        self.ctx.record(
            AuditEvent::new(actor, "PRESCRIPTION_CREATED", resource::PRESCRIPTION, prescription.id)
                .with_details(serde_json::json!({
                    "appointment": prescription.appointment.to_string(),
                    "medicines": written.detail.medicines.len(),
                    "lab_tests": written.detail.lab_tests.len(),
                })),
        );
        if written.completed_visit {
            self.ctx.record(AuditEvent::new(
                actor,
                appointment_action(AppointmentStatus::Completed),
                resource::APPOINTMENT,
                prescription.appointment,
            ));
        }
        self.ctx.notify(
            NotificationRequest::push(
                written.patient_user,
                NotificationCategory::PrescriptionReady,
                "Prescription ready",
                format!("Your prescription for {} is ready.", prescription.diagnosis),
            )
            .for_appointment(prescription.appointment),
        );
        Ok(written.detail)
    }

    pub fn get(&self, actor: &Actor, id: RecordId) -> CareResult<PrescriptionDetail> {
        authorize(actor, Operation::ViewPrescriptions)?;
        self.ctx.store().read(|t| {
            let prescription = t.prescriptions.fetch(id)?;
            if !can_view(t, &AccessScope::resolve(t, actor), prescription) {
                return Err(CareError::permission("you may not view this prescription"));
            }
            Ok(PrescriptionDetail::load(t, prescription))
        })
    }

    /// Prescriptions visible to the actor, newest first.
    pub fn list(&self, actor: &Actor) -> CareResult<Vec<PrescriptionDetail>> {
        authorize(actor, Operation::ViewPrescriptions)?;
        let mut found = self.ctx.store().read(|t| {
            let scope = AccessScope::resolve(t, actor);
            Ok(t.prescriptions
                .values()
                .filter(|p| can_view(t, &scope, p))
                .map(|p| PrescriptionDetail::load(t, p))
                .collect::<Vec<_>>())
        })?;
        found.sort_by_key(|d| std::cmp::Reverse(d.prescription.created_at));
        Ok(found)
    }

    /// The calling patient's prescriptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::NotFound`] if the actor has no patient profile yet.
    pub fn patient_prescriptions(&self, actor: &Actor) -> CareResult<Vec<PrescriptionDetail>> {
        authorize(actor, Operation::PatientPrescriptions)?;
        let mut found = self.ctx.store().read(|t| {
            let patient = t
                .patient_for_user(actor.user_id)
                .ok_or_else(|| CareError::not_found("patient profile", actor.user_id))?;
            Ok(t.prescriptions
                .values()
                .filter(|p| p.patient == patient.id)
                .map(|p| PrescriptionDetail::load(t, p))
                .collect::<Vec<_>>())
        })?;
        found.sort_by_key(|d| std::cmp::Reverse(d.prescription.created_at));
        Ok(found)
    }
}
