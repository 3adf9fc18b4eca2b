//! Electronic medical record: one visit record per consultation, vitals, and history.

use crate::audit::AuditEvent;
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{AppointmentStatus, EmrRecord, Role, VitalsRecord};
use crate::policy::{authorize, AccessScope, Operation};
use crate::store::TableExt;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::NonEmptyText;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NewEmr {
    pub appointment: RecordId,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub clinical_notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewVitals {
    pub temperature_celsius: Option<Decimal>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub notes: String,
}

impl NewVitals {
    fn validate(&self) -> CareResult<()> {
        if let Some(temp) = self.temperature_celsius {
            if temp < Decimal::from(25) || temp > Decimal::from(45) {
                return Err(CareError::validation(format!(
                    "temperature {temp}°C is out of range"
                )));
            }
        }
        if self.oxygen_saturation.is_some_and(|spo2| spo2 > 100) {
            return Err(CareError::validation("oxygen saturation cannot exceed 100%"));
        }
        if self.heart_rate == Some(0) {
            return Err(CareError::validation("heart rate must be positive"));
        }
        Ok(())
    }
}

/// One visit in a patient's history, with the latest vitals taken for it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub record: EmrRecord,
    pub vitals: Option<VitalsRecord>,
}

#[derive(Clone)]
pub struct EmrService {
    ctx: Arc<CoreContext>,
}

impl EmrService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Records the clinical findings for an appointment (its assigned doctor only).
    ///
    /// The appointment must be InProgress or Completed and may have only one record. A
    /// prescription already written for the appointment is linked to the new record.
    pub fn record_visit(&self, actor: &Actor, visit: NewEmr) -> CareResult<EmrRecord> {
        authorize(actor, Operation::RecordVisit)?;
        let complaint = NonEmptyText::new(&visit.chief_complaint)
            .map_err(|_| CareError::validation("chief complaint is required"))?;
        let now = Utc::now();

        let record = self.ctx.store().transaction(|t| {
            let appt = t.appointments.fetch(visit.appointment)?;
            let doctor = AccessScope::resolve(t, actor).require_assigned_doctor(appt)?;
            if !matches!(
                appt.status,
                AppointmentStatus::InProgress | AppointmentStatus::Completed
            ) {
                return Err(CareError::conflict(format!(
                    "cannot record a visit for an appointment that is {}",
                    appt.status
                )));
            }
            if t.emr_for_appointment(appt.id).is_some() {
                return Err(CareError::conflict("this visit has already been recorded"));
            }

            let record = EmrRecord {
                id: RecordId::new(),
                patient: appt.patient,
                hospital: appt.hospital,
                appointment: appt.id,
                doctor,
                visit_type: appt.appointment_type,
                chief_complaint: complaint,
                diagnosis: visit.diagnosis.trim().to_string(),
                treatment_plan: visit.treatment_plan.trim().to_string(),
                clinical_notes: visit.clinical_notes.trim().to_string(),
                vitals: None,
                recorded_by: actor.user_id,
                visit_date: appt.appointment_date,
                created_at: now,
            };
            let unlinked = t
                .prescription_for_appointment(record.appointment)
                .filter(|p| p.emr.is_none())
                .map(|p| p.id);
            if let Some(prescription) = unlinked {
                t.prescriptions.fetch_mut(prescription)?.emr = Some(record.id);
            }
            t.emr_records.put(record.clone());
            Ok(record)
        })?;

        tracing::info!(emr = %record.id, appointment = %record.appointment, "visit recorded");
        self.ctx.record(AuditEvent::new(actor, "EMR_CREATED", resource::EMR, record.id));
        Ok(record)
    }

    /// Adds a vitals reading to a visit record (nurses and medical assistants).
    pub fn add_vitals(
        &self,
        actor: &Actor,
        emr: RecordId,
        vitals: NewVitals,
    ) -> CareResult<VitalsRecord> {
        authorize(actor, Operation::RecordVitals)?;
        vitals.validate()?;
        let now = Utc::now();

        let reading = self.ctx.store().transaction(|t| {
            let reading = VitalsRecord {
                id: RecordId::new(),
                emr,
                recorded_by: actor.user_id,
                temperature_celsius: vitals.temperature_celsius,
                blood_pressure: vitals.blood_pressure.map(|bp| bp.trim().to_string()),
                heart_rate: vitals.heart_rate,
                oxygen_saturation: vitals.oxygen_saturation,
                notes: vitals.notes.trim().to_string(),
                recorded_at: now,
            };
            t.emr_records.fetch_mut(emr)?.vitals = Some(reading.id);
            t.vitals.put(reading.clone());
            Ok(reading)
        })?;

        self.ctx.record(AuditEvent::new(
            actor,
            "VITALS_RECORDED",
            resource::VITALS,
            reading.id,
        ));
        Ok(reading)
    }

    /// A patient's visit records, newest first.
    ///
    /// Patients see only their own history; for anyone else's they get an empty list.
    /// Hospital admins and directors see visits at their hospitals. Every call is audited.
    pub fn patient_history(&self, actor: &Actor, patient: RecordId) -> CareResult<Vec<HistoryEntry>> {
        authorize(actor, Operation::ViewMedicalHistory)?;
        let mut entries = self.ctx.store().read(|t| {
            t.patients.fetch(patient)?;
            let scope = AccessScope::resolve(t, actor);
            let visible = |record: &EmrRecord| match actor.role {
                Role::Patient => scope.owns_patient(record.patient),
                Role::HospitalAdmin | Role::HospitalDirector => {
                    scope.staff_hospitals.contains(&record.hospital)
                }
                _ => true,
            };
            Ok(t.emr_records
                .values()
                .filter(|r| r.patient == patient && visible(r))
                .map(|r| HistoryEntry {
                    record: r.clone(),
                    vitals: r.vitals.and_then(|v| t.vitals.get(&v)).cloned(),
                })
                .collect::<Vec<_>>())
        })?;
        entries.sort_by_key(|e| std::cmp::Reverse((e.record.visit_date, e.record.created_at)));

        self.ctx.record(
            AuditEvent::new(actor, "EMR_ACCESSED", resource::PATIENT, patient)
                .with_details(serde_json::json!({ "records": entries.len() })),
        );
        Ok(entries)
    }
}
