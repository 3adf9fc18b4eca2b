//! Appointment service: creation, review, assignment and status changes.

use crate::audit::{appointment_action, AuditEvent};
use crate::config::CoreConfig;
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{
    Appointment, AppointmentStatus, AppointmentType, Priority, QueueEntry, Role,
};
use crate::notify::{NotificationCategory, NotificationRequest};
use crate::policy::{authorize, ensure_patient_profile, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::workflow::allocate_queue_entry;
use crate::workflow::finance::refresh_commission;
use crate::workflow::transitions::check_transition;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::{Money, NonEmptyText};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;

// ============================================================================
// INPUTS
// ============================================================================

/// A patient's appointment request.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub hospital: RecordId,
    pub department: Option<RecordId>,
    /// The patient's preferred doctor. Recorded as a hint only.
    pub preferred_doctor: Option<RecordId>,
    pub appointment_type: AppointmentType,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: String,
    pub priority: Option<Priority>,
    pub notes: String,
}

/// An operations manager's assignment decision.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    /// Doctor to assign; may be omitted when re-assigning an appointment that has one.
    pub doctor: Option<RecordId>,
    pub department: Option<RecordId>,
    pub notes: String,
}

/// A generic update, routed by the actor's role.
#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub doctor: Option<RecordId>,
    pub department: Option<RecordId>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    /// Only appointments dated today or later.
    pub upcoming: bool,
    pub hospital: Option<RecordId>,
}

impl AppointmentFilter {
    fn matches(&self, appointment: &Appointment, today: NaiveDate) -> bool {
        self.status.is_none_or(|s| appointment.status == s)
            && self.date.is_none_or(|d| appointment.appointment_date == d)
            && (!self.upcoming || appointment.appointment_date >= today)
            && self.hospital.is_none_or(|h| appointment.hospital == h)
    }
}

// ============================================================================
// SHARED TRANSITION STEPS
// ============================================================================

/// Assigns a doctor inside an open transaction.
///
/// Validates the graph edge and the doctor's hospital, stamps the reviewer, copies the
/// doctor's fee onto the appointment only if it has none, recomputes commission and
/// allocates a walk-in queue number where applicable. Scope checks are the caller's job.
pub(crate) fn apply_assignment(
    tables: &mut Tables,
    cfg: &CoreConfig,
    appointment: RecordId,
    assignment: &Assignment,
    reviewer: RecordId,
    now: DateTime<Utc>,
) -> CareResult<Option<QueueEntry>> {
    let (hospital_id, status, current_doctor) = {
        let appt = tables.appointments.fetch(appointment)?;
        (appt.hospital, appt.status, appt.doctor)
    };
    check_transition(status, AppointmentStatus::Assigned)?;

    let doctor_id = assignment
        .doctor
        .or(current_doctor)
        .ok_or_else(|| CareError::validation("a doctor is required to assign an appointment"))?;
    let doctor = tables.doctors.fetch(doctor_id)?.clone();
    if doctor.hospital != hospital_id {
        return Err(CareError::validation("doctor does not work at this hospital"));
    }
    if !doctor.is_active {
        return Err(CareError::validation("doctor is not active"));
    }
    if let Some(department) = assignment.department {
        if tables.departments.fetch(department)?.hospital != hospital_id {
            return Err(CareError::validation(
                "department does not belong to this hospital",
            ));
        }
    }
    let hospital = tables.hospitals.fetch(hospital_id)?.clone();

    let appt = tables.appointments.fetch_mut(appointment)?;
    appt.doctor = Some(doctor.id);
    appt.department = assignment
        .department
        .or(appt.department)
        .or(doctor.department);
    appt.status = AppointmentStatus::Assigned;
    appt.reviewed_by = Some(reviewer);
    appt.reviewed_at = Some(now);
    appt.append_operations_note(&assignment.notes);
    if appt.consultation_fee.is_none() {
        appt.consultation_fee = Some(doctor.consultation_fee);
    }
    refresh_commission(appt, &hospital);
    appt.updated_at = now;

    allocate_queue_entry(tables, cfg, appointment, now)
}

/// What a committed transition produced, for audit and notification after commit.
struct Transitioned {
    appointment: Appointment,
    patient_user: RecordId,
    queue_entry: Option<QueueEntry>,
}

fn validate_not_past(date: NaiveDate, today: NaiveDate) -> CareResult<()> {
    if date < today {
        return Err(CareError::validation(format!(
            "appointment date {date} is in the past"
        )));
    }
    Ok(())
}

// ============================================================================
// APPOINTMENT SERVICE
// ============================================================================

/// Service for appointment lifecycle operations.
///
/// Every method takes the acting user first and performs its role check before touching
/// the store. Each mutating method is a single store transaction; audit entries and
/// notifications follow the commit.
#[derive(Clone)]
pub struct AppointmentService {
    ctx: Arc<CoreContext>,
}

impl AppointmentService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Creates a Requested appointment for the calling patient.
    ///
    /// # Arguments
    ///
    /// * `actor` - Must hold the patient role.
    /// * `request` - Hospital, type, date/time and reason. The date must not be in the past.
    ///
    /// # Returns
    ///
    /// The stored appointment, with no consultation fee until a doctor is assigned.
    ///
    /// # Errors
    ///
    /// - [`CareError::Permission`] for non-patients.
    /// - [`CareError::Validation`] for a past date, blank reason, inactive hospital, or a
    ///   department/doctor that belongs to another hospital.
    /// - [`CareError::NotFound`] if the hospital, department or doctor does not exist.
    pub fn create(&self, actor: &Actor, request: NewAppointment) -> CareResult<Appointment> {
        authorize(actor, Operation::RequestAppointment)?;
        let now = Utc::now();
        validate_not_past(request.appointment_date, now.date_naive())?;
        let reason = NonEmptyText::new(&request.reason)
            .map_err(|_| CareError::validation("reason for visit is required"))?;

        let appointment = self.ctx.store().transaction(|t| {
            let hospital = t.hospitals.fetch(request.hospital)?;
            if !hospital.is_active {
                return Err(CareError::validation("hospital is not accepting appointments"));
            }
            if let Some(department) = request.department {
                if t.departments.fetch(department)?.hospital != request.hospital {
                    return Err(CareError::validation(
                        "department does not belong to this hospital",
                    ));
                }
            }
            if let Some(doctor) = request.preferred_doctor {
                if t.doctors.fetch(doctor)?.hospital != request.hospital {
                    return Err(CareError::validation("doctor does not work at this hospital"));
                }
            }

            let patient = ensure_patient_profile(t, actor.user_id, now);
            let appointment = Appointment {
                id: RecordId::new(),
                patient,
                hospital: request.hospital,
                department: request.department,
                doctor: None,
                preferred_doctor: request.preferred_doctor,
                appointment_type: request.appointment_type,
                appointment_date: request.appointment_date,
                appointment_time: request.appointment_time,
                status: AppointmentStatus::Requested,
                priority: request.priority.unwrap_or_default(),
                reason,
                operations_notes: String::new(),
                reviewed_by: None,
                reviewed_at: None,
                consultation_fee: None,
                platform_commission: Money::ZERO,
                is_walk_in: false,
                notes: request.notes.trim().to_string(),
                created_at: now,
                updated_at: now,
            };
            t.appointments.put(appointment.clone());
            Ok(appointment)
        })?;

        tracing::info!(appointment = %appointment.id, hospital = %appointment.hospital, "appointment requested");
        self.ctx.record(AuditEvent::new(
            actor,
            appointment_action(AppointmentStatus::Requested),
            resource::APPOINTMENT,
            appointment.id,
        ));
        Ok(appointment)
    }

    /// Assigns a doctor (operations manager of the appointment's hospital only).
    ///
    /// # Errors
    ///
    /// - [`CareError::NotFound`] if the appointment or doctor does not exist.
    /// - [`CareError::Permission`] if the actor does not manage the hospital.
    /// - [`CareError::Validation`] if no doctor is given or the doctor works elsewhere.
    /// - [`CareError::StateConflict`] if the appointment cannot move to Assigned.
    pub fn assign(
        &self,
        actor: &Actor,
        id: RecordId,
        assignment: Assignment,
    ) -> CareResult<Appointment> {
        authorize(actor, Operation::AssignAppointment)?;
        let now = Utc::now();
        let cfg = self.ctx.cfg().clone();

        let done = self.ctx.store().transaction(|t| {
            let hospital = t.appointments.fetch(id)?.hospital;
            AccessScope::resolve(t, actor).require_managed(hospital)?;
            let queue_entry = apply_assignment(t, &cfg, id, &assignment, actor.user_id, now)?;
            let appointment = t.appointments.fetch(id)?.clone();
            Ok(Transitioned {
                patient_user: t.patient_user(appointment.patient)?,
                appointment,
                queue_entry,
            })
        })?;

        tracing::info!(
            appointment = %id,
            doctor = ?done.appointment.doctor,
            fee = ?done.appointment.consultation_fee.map(|f| f.to_string()),
            commission = %done.appointment.platform_commission,
            "appointment assigned"
        );
        self.announce(
            actor,
            &done,
            NotificationCategory::General,
            "Doctor assigned",
            "A doctor has been assigned to your appointment.",
        );
        Ok(done.appointment)
    }

    pub fn review(&self, actor: &Actor, id: RecordId, notes: &str) -> CareResult<Appointment> {
        let done = self.operations_transition(
            actor,
            id,
            Operation::ReviewAppointment,
            AppointmentStatus::Reviewed,
            |appt| {
                appt.append_operations_note(notes);
                Ok(())
            },
        )?;
        self.announce(
            actor,
            &done,
            NotificationCategory::General,
            "Appointment reviewed",
            "Your appointment request has been reviewed.",
        );
        Ok(done.appointment)
    }

    /// Confirms the slot with the patient.
    ///
    /// # Errors
    ///
    /// [`CareError::StateConflict`] if the graph forbids the move or no doctor is assigned
    /// (a rescheduled appointment that never had one).
    pub fn confirm(&self, actor: &Actor, id: RecordId, notes: &str) -> CareResult<Appointment> {
        let done = self.operations_transition(
            actor,
            id,
            Operation::ConfirmAppointment,
            AppointmentStatus::Confirmed,
            |appt| {
                if appt.doctor.is_none() {
                    return Err(CareError::conflict(
                        "appointment must be assigned a doctor before it is confirmed",
                    ));
                }
                appt.append_operations_note(notes);
                Ok(())
            },
        )?;
        let body = format!(
            "Your appointment on {} at {} is confirmed.",
            done.appointment.appointment_date,
            done.appointment.appointment_time.format("%H:%M")
        );
        self.announce(
            actor,
            &done,
            NotificationCategory::AppointmentConfirmed,
            "Appointment confirmed",
            &body,
        );
        Ok(done.appointment)
    }

    pub fn cancel(
        &self,
        actor: &Actor,
        id: RecordId,
        reason: Option<&str>,
    ) -> CareResult<Appointment> {
        let done = self.operations_transition(
            actor,
            id,
            Operation::CancelAppointment,
            AppointmentStatus::Cancelled,
            |appt| {
                if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
                    appt.append_operations_note(&format!("Cancelled: {reason}"));
                }
                Ok(())
            },
        )?;
        self.announce(
            actor,
            &done,
            NotificationCategory::AppointmentCancelled,
            "Appointment cancelled",
            "Your appointment has been cancelled.",
        );
        Ok(done.appointment)
    }

    /// Moves the appointment to a new slot. The new date must not be in the past.
    pub fn reschedule(
        &self,
        actor: &Actor,
        id: RecordId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> CareResult<Appointment> {
        authorize(actor, Operation::RescheduleAppointment)?;
        validate_not_past(date, Utc::now().date_naive())?;
        let done = self.operations_transition(
            actor,
            id,
            Operation::RescheduleAppointment,
            AppointmentStatus::Rescheduled,
            |appt| {
                appt.appointment_date = date;
                appt.appointment_time = time;
                Ok(())
            },
        )?;
        let body = format!(
            "Your appointment has moved to {} at {}.",
            date,
            time.format("%H:%M")
        );
        self.announce(
            actor,
            &done,
            NotificationCategory::General,
            "Appointment rescheduled",
            &body,
        );
        Ok(done.appointment)
    }

    /// Doctor moves their own appointment to InProgress or Completed.
    ///
    /// # Errors
    ///
    /// - [`CareError::Permission`] for any other target, a non-doctor, or an appointment
    ///   assigned to someone else. The appointment is left unchanged.
    /// - [`CareError::StateConflict`] if the graph does not allow the move.
    pub fn doctor_update_status(
        &self,
        actor: &Actor,
        id: RecordId,
        target: AppointmentStatus,
    ) -> CareResult<Appointment> {
        authorize(actor, Operation::UpdateVisitStatus)?;
        if !matches!(
            target,
            AppointmentStatus::InProgress | AppointmentStatus::Completed
        ) {
            tracing::warn!(user = %actor.user_id, %target, "doctor attempted non-clinical status");
            return Err(CareError::permission(format!(
                "doctors may not set status {target}"
            )));
        }
        let now = Utc::now();

        let done = self.ctx.store().transaction(|t| {
            let scope = AccessScope::resolve(t, actor);
            let current = t.appointments.fetch(id)?;
            scope.require_assigned_doctor(current)?;
            check_transition(current.status, target)?;

            let appt = t.appointments.fetch_mut(id)?;
            appt.status = target;
            appt.updated_at = now;
            let appointment = appt.clone();
            Ok(Transitioned {
                patient_user: t.patient_user(appointment.patient)?,
                appointment,
                queue_entry: None,
            })
        })?;

        tracing::info!(appointment = %id, status = %target, "visit status updated");
        self.ctx.record(AuditEvent::new(
            actor,
            appointment_action(target),
            resource::APPOINTMENT,
            id,
        ));
        Ok(done.appointment)
    }

    /// Role-dispatched update.
    ///
    /// Operations managers may change status (routed to the matching operation) or add
    /// notes; doctors may only set InProgress/Completed; patients may edit the reason, notes
    /// and slot of their own Requested appointment but never its status.
    pub fn update(
        &self,
        actor: &Actor,
        id: RecordId,
        update: AppointmentUpdate,
    ) -> CareResult<Appointment> {
        match actor.role {
            Role::Patient => {
                if let Some(status) = update.status {
                    tracing::warn!(user = %actor.user_id, %status, "patient attempted status change");
                    return Err(CareError::permission(
                        "patients cannot change appointment status",
                    ));
                }
                self.edit_details(actor, id, update)
            }
            Role::Doctor => match update.status {
                Some(status) => self.doctor_update_status(actor, id, status),
                None => Err(CareError::permission(
                    "doctors may only update visit status",
                )),
            },
            Role::OperationsManager => {
                let notes = update.notes.clone().unwrap_or_default();
                match update.status {
                    None => self.add_operations_note(actor, id, &notes),
                    Some(AppointmentStatus::Reviewed) => self.review(actor, id, &notes),
                    Some(AppointmentStatus::Assigned) => self.assign(
                        actor,
                        id,
                        Assignment {
                            doctor: update.doctor,
                            department: update.department,
                            notes,
                        },
                    ),
                    Some(AppointmentStatus::Confirmed) => self.confirm(actor, id, &notes),
                    Some(AppointmentStatus::Cancelled) => {
                        self.cancel(actor, id, update.notes.as_deref())
                    }
                    Some(AppointmentStatus::Rescheduled) => {
                        match (update.appointment_date, update.appointment_time) {
                            (Some(date), Some(time)) => self.reschedule(actor, id, date, time),
                            _ => Err(CareError::validation(
                                "rescheduling requires a new date and time",
                            )),
                        }
                    }
                    Some(other) => Err(CareError::permission(format!(
                        "operations managers may not set status {other}"
                    ))),
                }
            }
            _ => {
                tracing::warn!(user = %actor.user_id, role = %actor.role, "appointment update denied");
                Err(CareError::permission(format!(
                    "role {} may not update appointments",
                    actor.role
                )))
            }
        }
    }

    pub fn get(&self, actor: &Actor, id: RecordId) -> CareResult<Appointment> {
        authorize(actor, Operation::ViewAppointments)?;
        self.ctx.store().read(|t| {
            let appt = t.appointments.fetch(id)?;
            if !AccessScope::resolve(t, actor).can_view_appointment(appt) {
                return Err(CareError::permission("you may not view this appointment"));
            }
            Ok(appt.clone())
        })
    }

    /// Appointments visible to the actor, ordered by date then time.
    ///
    /// Actors without an attached profile get an empty list.
    pub fn list(&self, actor: &Actor, filter: &AppointmentFilter) -> CareResult<Vec<Appointment>> {
        authorize(actor, Operation::ViewAppointments)?;
        let today = Utc::now().date_naive();
        let mut found = self.ctx.store().read(|t| {
            let scope = AccessScope::resolve(t, actor);
            Ok(t.appointments
                .values()
                .filter(|a| scope.can_view_appointment(a) && filter.matches(a, today))
                .cloned()
                .collect::<Vec<_>>())
        })?;
        found.sort_by_key(|a| (a.appointment_date, a.appointment_time));
        tracing::debug!(user = %actor.user_id, count = found.len(), "listed appointments");
        Ok(found)
    }

    /// The operations review queue: appointments in `status` (default Requested) at the
    /// hospitals the actor manages, ordered by date then time.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::NotFound`] when the actor manages no hospitals.
    pub fn operations_queue(
        &self,
        actor: &Actor,
        status: Option<AppointmentStatus>,
    ) -> CareResult<Vec<Appointment>> {
        authorize(actor, Operation::OperationsQueue)?;
        let status = status.unwrap_or(AppointmentStatus::Requested);
        let mut found = self.ctx.store().read(|t| {
            let scope = AccessScope::resolve(t, actor);
            if scope.managed_hospitals.is_empty() {
                return Err(CareError::not_found("managed hospital", actor.user_id));
            }
            Ok(t.appointments
                .values()
                .filter(|a| a.status == status && scope.manages(a.hospital))
                .cloned()
                .collect::<Vec<_>>())
        })?;
        found.sort_by_key(|a| (a.appointment_date, a.appointment_time));
        Ok(found)
    }

    /// The calling patient's appointments, newest first. Creates their profile if needed.
    pub fn patient_appointments(&self, actor: &Actor) -> CareResult<Vec<Appointment>> {
        authorize(actor, Operation::PatientAppointments)?;
        let existing = self
            .ctx
            .store()
            .read(|t| Ok(t.patient_for_user(actor.user_id).map(|p| p.id)))?;
        let patient = match existing {
            Some(id) => id,
            None => self
                .ctx
                .store()
                .transaction(|t| Ok(ensure_patient_profile(t, actor.user_id, Utc::now())))?,
        };

        let mut found = self.ctx.store().read(|t| {
            Ok(t.appointments
                .values()
                .filter(|a| a.patient == patient)
                .cloned()
                .collect::<Vec<_>>())
        })?;
        found.sort_by_key(|a| std::cmp::Reverse((a.appointment_date, a.appointment_time)));
        Ok(found)
    }

    /// The calling doctor's assigned appointments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::NotFound`] if the actor has no doctor profile.
    pub fn doctor_appointments(&self, actor: &Actor) -> CareResult<Vec<Appointment>> {
        authorize(actor, Operation::DoctorAppointments)?;
        let mut found = self.ctx.store().read(|t| {
            let doctor = t
                .doctor_for_user(actor.user_id)
                .ok_or_else(|| CareError::not_found("doctor profile", actor.user_id))?;
            Ok(t.appointments
                .values()
                .filter(|a| a.is_assigned_to(doctor.id))
                .cloned()
                .collect::<Vec<_>>())
        })?;
        found.sort_by_key(|a| (a.appointment_date, a.appointment_time));
        Ok(found)
    }

    // ------------------------------------------------------------------------

    fn operations_transition(
        &self,
        actor: &Actor,
        id: RecordId,
        op: Operation,
        target: AppointmentStatus,
        change: impl FnOnce(&mut Appointment) -> CareResult<()>,
    ) -> CareResult<Transitioned> {
        authorize(actor, op)?;
        let now = Utc::now();
        let cfg = self.ctx.cfg().clone();

        let done = self.ctx.store().transaction(|t| {
            let current = t.appointments.fetch(id)?;
            AccessScope::resolve(t, actor).require_managed(current.hospital)?;
            check_transition(current.status, target)?;

            let appt = t.appointments.fetch_mut(id)?;
            change(appt)?;
            appt.status = target;
            appt.reviewed_by = Some(actor.user_id);
            appt.reviewed_at = Some(now);
            appt.updated_at = now;

            let queue_entry = allocate_queue_entry(t, &cfg, id, now)?;
            let appointment = t.appointments.fetch(id)?.clone();
            Ok(Transitioned {
                patient_user: t.patient_user(appointment.patient)?,
                appointment,
                queue_entry,
            })
        })?;

        tracing::info!(appointment = %id, status = %target, "appointment status changed");
        Ok(done)
    }

    fn edit_details(
        &self,
        actor: &Actor,
        id: RecordId,
        update: AppointmentUpdate,
    ) -> CareResult<Appointment> {
        authorize(actor, Operation::EditAppointmentDetails)?;
        let now = Utc::now();
        if let Some(date) = update.appointment_date {
            validate_not_past(date, now.date_naive())?;
        }
        let reason = update
            .reason
            .as_deref()
            .map(NonEmptyText::new)
            .transpose()
            .map_err(|_| CareError::validation("reason for visit cannot be blank"))?;

        let appointment = self.ctx.store().transaction(|t| {
            let scope = AccessScope::resolve(t, actor);
            let appt = t.appointments.fetch_mut(id)?;
            if !scope.owns_patient(appt.patient) {
                return Err(CareError::permission("this is not your appointment"));
            }
            if appt.status != AppointmentStatus::Requested {
                return Err(CareError::conflict(
                    "only requested appointments can be edited",
                ));
            }
            if let Some(reason) = reason {
                appt.reason = reason;
            }
            if let Some(notes) = update.notes {
                appt.notes = notes.trim().to_string();
            }
            if let Some(date) = update.appointment_date {
                appt.appointment_date = date;
            }
            if let Some(time) = update.appointment_time {
                appt.appointment_time = time;
            }
            appt.updated_at = now;
            Ok(appt.clone())
        })?;

        self.ctx.record(AuditEvent::new(
            actor,
            "APPOINTMENT_UPDATED",
            resource::APPOINTMENT,
            id,
        ));
        Ok(appointment)
    }

    fn add_operations_note(&self, actor: &Actor, id: RecordId, note: &str) -> CareResult<Appointment> {
        authorize(actor, Operation::ReviewAppointment)?;
        let appointment = self.ctx.store().transaction(|t| {
            let scope = AccessScope::resolve(t, actor);
            let appt = t.appointments.fetch_mut(id)?;
            scope.require_managed(appt.hospital)?;
            appt.append_operations_note(note);
            appt.updated_at = Utc::now();
            Ok(appt.clone())
        })?;
        self.ctx.record(AuditEvent::new(
            actor,
            "APPOINTMENT_UPDATED",
            resource::APPOINTMENT,
            id,
        ));
        Ok(appointment)
    }

    fn announce(
        &self,
        actor: &Actor,
        done: &Transitioned,
        category: NotificationCategory,
        title: &str,
        body: &str,
    ) {
        let appt = &done.appointment;
        let mut event = AuditEvent::new(
            actor,
            appointment_action(appt.status),
            resource::APPOINTMENT,
            appt.id,
        );
        if let Some(entry) = &done.queue_entry {
            event = event.with_details(serde_json::json!({
                "queue_number": entry.queue_number,
                "estimated_wait_minutes": entry.estimated_wait_minutes,
            }));
        }
        self.ctx.record(event);
        self.ctx.notify(
            NotificationRequest::push(done.patient_user, category, title, body)
                .for_appointment(appt.id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{AdminService, NewDoctor, NewUser};
    use crate::testing::{money, tomorrow, Fixture};
    use chrono::Days;

    fn assign_to(fx: &Fixture, id: RecordId, doctor: RecordId) -> CareResult<Appointment> {
        fx.appointments().assign(
            &fx.ops_manager,
            id,
            Assignment {
                doctor: Some(doctor),
                department: None,
                notes: "triaged".into(),
            },
        )
    }

    #[test]
    fn test_create_rejects_past_date() {
        let fx = Fixture::new();
        let yesterday = Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .expect("date in range");
        let err = fx
            .appointments()
            .create(&fx.patient, fx.new_appointment(yesterday))
            .expect_err("past date must be rejected");
        assert!(matches!(err, CareError::Validation(_)));
        assert!(fx.ctx.store().read(|t| Ok(t.appointments.is_empty())).expect("read"));
    }

    #[test]
    fn test_create_accepts_today() {
        let fx = Fixture::new();
        let appt = fx
            .appointments()
            .create(&fx.patient, fx.new_appointment(Utc::now().date_naive()))
            .expect("today is allowed");
        assert_eq!(appt.status, AppointmentStatus::Requested);
    }

    #[test]
    fn test_create_leaves_fee_unset_and_audits() {
        let fx = Fixture::new();
        let appt = fx.book();
        assert_eq!(appt.status, AppointmentStatus::Requested);
        assert_eq!(appt.consultation_fee, None);
        assert!(appt.platform_commission.is_zero());
        assert!(appt.doctor.is_none());
        assert_eq!(fx.audit_actions(appt.id), vec!["APPOINTMENT_REQUESTED"]);

        let profile = fx
            .ctx
            .store()
            .read(|t| Ok(t.patient_for_user(fx.patient.user_id).map(|p| p.id)))
            .expect("read");
        assert_eq!(profile, Some(appt.patient));
    }

    #[test]
    fn test_only_patients_create() {
        let fx = Fixture::new();
        let err = fx
            .appointments()
            .create(&fx.ops_manager, fx.new_appointment(tomorrow()))
            .expect_err("operations manager cannot request");
        assert!(matches!(err, CareError::Permission(_)));
    }

    #[test]
    fn test_create_unknown_hospital_is_not_found() {
        let fx = Fixture::new();
        let mut request = fx.new_appointment(tomorrow());
        request.hospital = RecordId::new();
        let err = fx
            .appointments()
            .create(&fx.patient, request)
            .expect_err("unknown hospital");
        assert!(matches!(err, CareError::NotFound { kind: "hospital", .. }));
    }

    #[test]
    fn test_preferred_doctor_is_not_an_assignment() {
        let fx = Fixture::new();
        let mut request = fx.new_appointment(tomorrow());
        request.preferred_doctor = Some(fx.doctor_id);
        let appt = fx
            .appointments()
            .create(&fx.patient, request)
            .expect("create with preference");
        assert_eq!(appt.preferred_doctor, Some(fx.doctor_id));
        assert_eq!(appt.doctor, None);
        assert_eq!(appt.consultation_fee, None);

        let err = fx
            .appointments()
            .doctor_update_status(&fx.doctor, appt.id, AppointmentStatus::InProgress)
            .expect_err("preferred doctor is not assigned");
        assert!(matches!(err, CareError::Permission(_)));
    }

    #[test]
    fn test_patient_can_never_set_status() {
        let fx = Fixture::new();
        let appt = fx.book();
        for status in [
            AppointmentStatus::Assigned,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
        ] {
            let err = fx
                .appointments()
                .update(
                    &fx.patient,
                    appt.id,
                    AppointmentUpdate {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .expect_err("patient status change must fail");
            assert!(matches!(err, CareError::Permission(_)), "{status}");
        }
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Requested);
    }

    #[test]
    fn test_patient_edits_own_requested_appointment_only() {
        let fx = Fixture::new();
        let appt = fx.book();
        let edit = AppointmentUpdate {
            reason: Some("Fever and cough".into()),
            ..Default::default()
        };

        let updated = fx
            .appointments()
            .update(&fx.patient, appt.id, edit.clone())
            .expect("own requested appointment");
        assert_eq!(updated.reason.as_str(), "Fever and cough");

        let err = fx
            .appointments()
            .update(&fx.other_patient, appt.id, edit.clone())
            .expect_err("someone else's appointment");
        assert!(matches!(err, CareError::Permission(_)));

        assign_to(&fx, appt.id, fx.doctor_id).expect("assign");
        let err = fx
            .appointments()
            .update(&fx.patient, appt.id, edit)
            .expect_err("assigned appointments are locked");
        assert!(matches!(err, CareError::StateConflict(_)));
    }

    #[test]
    fn test_assign_sets_fee_and_commission() {
        let fx = Fixture::new();
        let appt = fx.book();
        let assigned = assign_to(&fx, appt.id, fx.doctor_id).expect("assign");

        assert_eq!(assigned.status, AppointmentStatus::Assigned);
        assert_eq!(assigned.doctor, Some(fx.doctor_id));
        assert_eq!(assigned.consultation_fee, Some(money("500")));
        assert_eq!(assigned.platform_commission.to_string(), "25.00");
        assert_eq!(assigned.reviewed_by, Some(fx.ops_manager.user_id));
        assert!(assigned.reviewed_at.is_some());
        assert_eq!(assigned.operations_notes, "triaged");
        assert_eq!(
            fx.audit_actions(appt.id),
            vec!["APPOINTMENT_REQUESTED", "APPOINTMENT_ASSIGNED"]
        );
    }

    #[test]
    fn test_reassign_keeps_existing_fee() {
        let fx = Fixture::new();
        let appt = fx.book();
        assign_to(&fx, appt.id, fx.doctor_id).expect("first assign");
        let reassigned = assign_to(&fx, appt.id, fx.other_doctor_id).expect("re-assign");

        assert_eq!(reassigned.doctor, Some(fx.other_doctor_id));
        assert_eq!(reassigned.consultation_fee, Some(money("500")));
        assert_eq!(reassigned.platform_commission.to_string(), "25.00");
        assert_eq!(reassigned.operations_notes, "triaged\ntriaged");
    }

    #[test]
    fn test_commission_is_recomputed_not_accumulated() {
        let fx = Fixture::new();
        let appt = fx.book();
        for _ in 0..3 {
            let saved = assign_to(&fx, appt.id, fx.doctor_id).expect("assign");
            assert_eq!(saved.platform_commission.to_string(), "25.00");
        }
    }

    #[test]
    fn test_assign_requires_managed_hospital() {
        let fx = Fixture::new();
        let appt = fx.book();
        let err = fx
            .appointments()
            .assign(
                &fx.other_ops_manager,
                appt.id,
                Assignment {
                    doctor: Some(fx.doctor_id),
                    ..Default::default()
                },
            )
            .expect_err("manager of another hospital");
        assert!(matches!(err, CareError::Permission(_)));
        let unchanged = fx.appointment(appt.id);
        assert_eq!(unchanged.status, AppointmentStatus::Requested);
        assert_eq!(unchanged.consultation_fee, None);
    }

    #[test]
    fn test_assign_missing_appointment_is_not_found() {
        let fx = Fixture::new();
        let err = assign_to(&fx, RecordId::new(), fx.doctor_id).expect_err("missing");
        assert!(matches!(err, CareError::NotFound { kind: "appointment", .. }));
    }

    #[test]
    fn test_assign_rejects_doctor_from_other_hospital() {
        let fx = Fixture::new();
        let admin = AdminService::new(fx.ctx.clone());
        let user = admin
            .register_user(
                &fx.super_admin,
                NewUser {
                    email: "elsewhere@carelink.test".into(),
                    first_name: "Far".into(),
                    last_name: "Away".into(),
                    phone: None,
                    role: Role::Doctor,
                },
            )
            .expect("register doctor user");
        let outsider = admin
            .create_doctor(
                &fx.super_admin,
                NewDoctor {
                    user: user.id,
                    hospital: fx.other_hospital,
                    department: None,
                    specialization: "ENT".into(),
                    license_number: "LIC-X".into(),
                    consultation_fee: money("300"),
                },
            )
            .expect("create doctor");

        let appt = fx.book();
        let err = assign_to(&fx, appt.id, outsider.id).expect_err("wrong hospital");
        assert!(matches!(err, CareError::Validation(_)));
    }

    #[test]
    fn test_assign_without_any_doctor_is_rejected() {
        let fx = Fixture::new();
        let appt = fx.book();
        let err = fx
            .appointments()
            .assign(&fx.ops_manager, appt.id, Assignment::default())
            .expect_err("no doctor");
        assert!(matches!(err, CareError::Validation(_)));
    }

    #[test]
    fn test_booking_to_completion_scenario() {
        let fx = Fixture::new();
        let svc = fx.appointments();

        let booked = fx.book();
        assert_eq!(booked.status, AppointmentStatus::Requested);
        assert_eq!(booked.consultation_fee, None);

        let assigned = assign_to(&fx, booked.id, fx.doctor_id).expect("assign");
        assert_eq!(assigned.status, AppointmentStatus::Assigned);
        assert_eq!(assigned.consultation_fee.map(|f| f.to_string()).as_deref(), Some("500.00"));
        assert_eq!(assigned.platform_commission.to_string(), "25.00");

        let err = svc
            .doctor_update_status(&fx.other_doctor, booked.id, AppointmentStatus::InProgress)
            .expect_err("other doctor cannot start");
        assert!(matches!(err, CareError::Permission(_)));

        let started = svc
            .doctor_update_status(&fx.doctor, booked.id, AppointmentStatus::InProgress)
            .expect("assigned doctor starts visit");
        assert_eq!(started.status, AppointmentStatus::InProgress);

        let err = svc
            .doctor_update_status(&fx.other_doctor, booked.id, AppointmentStatus::Completed)
            .expect_err("other doctor cannot complete");
        assert!(matches!(err, CareError::Permission(_)));
        assert_eq!(fx.appointment(booked.id).status, AppointmentStatus::InProgress);

        let completed = svc
            .doctor_update_status(&fx.doctor, booked.id, AppointmentStatus::Completed)
            .expect("assigned doctor completes visit");
        assert_eq!(completed.status, AppointmentStatus::Completed);
        assert_eq!(
            fx.audit_actions(booked.id),
            vec![
                "APPOINTMENT_REQUESTED",
                "APPOINTMENT_ASSIGNED",
                "APPOINTMENT_IN_PROGRESS",
                "APPOINTMENT_COMPLETED",
            ]
        );
    }

    #[test]
    fn test_doctor_limited_to_clinical_statuses() {
        let fx = Fixture::new();
        let appt = fx.assigned();
        let err = fx
            .appointments()
            .doctor_update_status(&fx.doctor, appt.id, AppointmentStatus::Cancelled)
            .expect_err("doctor cannot cancel");
        assert!(matches!(err, CareError::Permission(_)));
    }

    #[test]
    fn test_doctor_cannot_skip_in_progress() {
        let fx = Fixture::new();
        let appt = fx.assigned();
        let err = fx
            .appointments()
            .doctor_update_status(&fx.doctor, appt.id, AppointmentStatus::Completed)
            .expect_err("assigned -> completed is not an edge");
        assert!(matches!(err, CareError::StateConflict(_)));
    }

    #[test]
    fn test_operations_cannot_confirm_cancelled() {
        let fx = Fixture::new();
        let appt = fx.book();
        let svc = fx.appointments();
        svc.cancel(&fx.ops_manager, appt.id, Some("duplicate booking"))
            .expect("cancel");
        let err = svc
            .confirm(&fx.ops_manager, appt.id, "")
            .expect_err("cancelled is terminal");
        assert!(matches!(err, CareError::StateConflict(_)));
        assert_eq!(
            fx.appointment(appt.id).operations_notes,
            "Cancelled: duplicate booking"
        );
    }

    #[test]
    fn test_confirm_requires_an_assigned_doctor() {
        let fx = Fixture::new();
        let appt = fx.book();
        let svc = fx.appointments();
        svc.review(&fx.ops_manager, appt.id, "").expect("review");
        let err = svc
            .confirm(&fx.ops_manager, appt.id, "")
            .expect_err("no doctor assigned");
        assert!(matches!(err, CareError::StateConflict(_)));
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Reviewed);

        svc.reschedule(
            &fx.ops_manager,
            appt.id,
            tomorrow(),
            NaiveTime::from_hms_opt(11, 0, 0).expect("time"),
        )
        .expect("reschedule");
        let err = svc
            .confirm(&fx.ops_manager, appt.id, "")
            .expect_err("still no doctor");
        assert!(matches!(err, CareError::StateConflict(_)));
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Rescheduled);

        let assigned = svc
            .assign(
                &fx.ops_manager,
                appt.id,
                Assignment {
                    doctor: Some(fx.doctor_id),
                    ..Default::default()
                },
            )
            .expect("assignment still possible");
        assert_eq!(assigned.status, AppointmentStatus::Assigned);
        let confirmed = svc.confirm(&fx.ops_manager, appt.id, "").expect("confirm");
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_confirm_and_cancel_notify_patient() {
        let fx = Fixture::new();
        let appt = fx.assigned();
        let svc = fx.appointments();
        svc.confirm(&fx.ops_manager, appt.id, "see you").expect("confirm");
        svc.cancel(&fx.ops_manager, appt.id, None).expect("cancel");

        let categories: Vec<_> = fx
            .ctx
            .notifications()
            .for_recipient(fx.patient.user_id)
            .into_iter()
            .map(|n| n.category)
            .collect();
        assert_eq!(
            categories,
            vec![
                NotificationCategory::General,
                NotificationCategory::AppointmentConfirmed,
                NotificationCategory::AppointmentCancelled,
            ]
        );
    }

    #[test]
    fn test_reschedule_moves_slot_and_requires_future_date() {
        let fx = Fixture::new();
        let appt = fx.assigned();
        let svc = fx.appointments();
        let later = tomorrow().checked_add_days(Days::new(6)).expect("date");
        let time = NaiveTime::from_hms_opt(15, 0, 0).expect("time");

        let moved = svc
            .update(
                &fx.ops_manager,
                appt.id,
                AppointmentUpdate {
                    status: Some(AppointmentStatus::Rescheduled),
                    appointment_date: Some(later),
                    appointment_time: Some(time),
                    ..Default::default()
                },
            )
            .expect("reschedule");
        assert_eq!(moved.status, AppointmentStatus::Rescheduled);
        assert_eq!(moved.appointment_date, later);

        let past = Utc::now().date_naive().checked_sub_days(Days::new(2)).expect("date");
        let err = svc
            .reschedule(&fx.ops_manager, appt.id, past, time)
            .expect_err("past date");
        assert!(matches!(err, CareError::Validation(_)));

        let back = svc.confirm(&fx.ops_manager, appt.id, "").expect("back on track");
        assert_eq!(back.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_operations_queue_is_scoped_and_defaults_to_requested() {
        let fx = Fixture::new();
        let waiting = fx.book();
        let assigned = fx.assigned();
        let svc = fx.appointments();

        let queue = svc.operations_queue(&fx.ops_manager, None).expect("queue");
        let ids: Vec<_> = queue.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![waiting.id]);

        let queue = svc
            .operations_queue(&fx.ops_manager, Some(AppointmentStatus::Assigned))
            .expect("assigned queue");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, assigned.id);

        let other = svc
            .operations_queue(&fx.other_ops_manager, None)
            .expect("other manager has a hospital");
        assert!(other.is_empty());
    }

    #[test]
    fn test_operations_queue_without_hospitals_is_not_found() {
        let fx = Fixture::new();
        let user = AdminService::new(fx.ctx.clone())
            .register_user(
                &fx.super_admin,
                NewUser {
                    email: "idle-ops@carelink.test".into(),
                    first_name: "Idle".into(),
                    last_name: "Ops".into(),
                    phone: None,
                    role: Role::OperationsManager,
                },
            )
            .expect("register");
        let idle = Actor {
            user_id: user.id,
            role: user.role,
            origin: None,
        };
        let err = fx
            .appointments()
            .operations_queue(&idle, None)
            .expect_err("no hospitals assigned");
        assert!(matches!(err, CareError::NotFound { .. }));
    }

    #[test]
    fn test_list_applies_scope_as_filter() {
        let fx = Fixture::new();
        let appt = fx.assigned();
        let svc = fx.appointments();
        let all = AppointmentFilter::default();

        assert_eq!(svc.list(&fx.patient, &all).expect("patient").len(), 1);
        assert!(svc.list(&fx.other_patient, &all).expect("no profile").is_empty());
        assert!(svc.list(&fx.nurse, &all).expect("unattached staff").is_empty());
        assert_eq!(svc.list(&fx.ops_manager, &all).expect("manager").len(), 1);
        assert!(svc.list(&fx.other_ops_manager, &all).expect("other").is_empty());
        assert_eq!(svc.list(&fx.doctor, &all).expect("doctor").len(), 1);
        assert!(svc.list(&fx.other_doctor, &all).expect("other doctor").is_empty());

        let requested_only = AppointmentFilter {
            status: Some(AppointmentStatus::Requested),
            ..Default::default()
        };
        assert!(svc.list(&fx.patient, &requested_only).expect("filter").is_empty());

        let err = svc.get(&fx.other_patient, appt.id).expect_err("detail is hard-denied");
        assert!(matches!(err, CareError::Permission(_)));
        assert_eq!(svc.get(&fx.patient, appt.id).expect("own").id, appt.id);
    }

    #[test]
    fn test_patient_appointments_newest_first_and_creates_profile() {
        let fx = Fixture::new();
        let svc = fx.appointments();
        let first = fx.book();
        let later = svc
            .create(
                &fx.patient,
                fx.new_appointment(tomorrow().checked_add_days(Days::new(3)).expect("date")),
            )
            .expect("second booking");

        let mine = svc.patient_appointments(&fx.patient).expect("own list");
        let ids: Vec<_> = mine.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![later.id, first.id]);

        let empty = svc
            .patient_appointments(&fx.other_patient)
            .expect("profile created on demand");
        assert!(empty.is_empty());
        let created = fx
            .ctx
            .store()
            .read(|t| Ok(t.patient_for_user(fx.other_patient.user_id).is_some()))
            .expect("read");
        assert!(created);
    }

    #[test]
    fn test_doctor_appointments_oldest_first() {
        let fx = Fixture::new();
        let svc = fx.appointments();
        let late = svc
            .create(
                &fx.patient,
                fx.new_appointment(tomorrow().checked_add_days(Days::new(5)).expect("date")),
            )
            .expect("book late");
        let early = fx.book();
        for id in [late.id, early.id] {
            assign_to(&fx, id, fx.doctor_id).expect("assign");
        }

        let mine = svc.doctor_appointments(&fx.doctor).expect("doctor list");
        let ids: Vec<_> = mine.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert!(svc
            .doctor_appointments(&fx.other_doctor)
            .expect("no assignments")
            .is_empty());
    }

    #[test]
    fn test_doctor_appointments_without_profile_is_not_found() {
        let fx = Fixture::new();
        let user = AdminService::new(fx.ctx.clone())
            .register_user(
                &fx.super_admin,
                NewUser {
                    email: "new-doc@carelink.test".into(),
                    first_name: "New".into(),
                    last_name: "Doc".into(),
                    phone: None,
                    role: Role::Doctor,
                },
            )
            .expect("register");
        let actor = Actor {
            user_id: user.id,
            role: Role::Doctor,
            origin: None,
        };
        let err = fx
            .appointments()
            .doctor_appointments(&actor)
            .expect_err("no doctor profile");
        assert!(matches!(err, CareError::NotFound { kind: "doctor profile", .. }));
    }
}
