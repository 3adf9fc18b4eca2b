//! Walk-in registration and same-day queues.
//!
//! Queue numbers are allocated inside the store's write transaction, so two registrations
//! for the same (hospital, queue type, day) can never observe the same "last number".
//!
//! Estimated wait is `uncalled entries ahead × minutes per patient`, with the per-patient
//! minutes configured per queue type.

use crate::audit::{appointment_action, AuditEvent};
use crate::config::CoreConfig;
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{
    Appointment, AppointmentStatus, AppointmentType, Priority, QueueEntry, QueueType, Role,
};
use crate::policy::{authorize, ensure_patient_profile, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::workflow::{apply_assignment, Assignment};
use crate::workflow::transitions::check_transition;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::{Money, NonEmptyText};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use std::sync::Arc;

/// An entry still waits while it is uncalled and its appointment is Assigned or Confirmed.
/// Entries of cancelled or rescheduled walk-ins are passed over.
fn is_waiting(tables: &Tables, entry: &QueueEntry) -> bool {
    entry.called_at.is_none()
        && tables
            .appointments
            .get(&entry.appointment)
            .is_some_and(|a| a.status.is_queue_active())
}

/// Allocates a queue entry if `appointment` is a walk-in OPD/emergency visit in an active
/// state and does not hold one yet.
pub(crate) fn allocate_queue_entry(
    tables: &mut Tables,
    cfg: &CoreConfig,
    appointment: RecordId,
    now: DateTime<Utc>,
) -> CareResult<Option<QueueEntry>> {
    let appt = tables.appointments.fetch(appointment)?;
    let Some(queue_type) = appt.appointment_type.queue_type() else {
        return Ok(None);
    };
    if !appt.is_walk_in || !appt.status.is_queue_active() {
        return Ok(None);
    }
    if tables
        .queue_entries
        .values()
        .any(|q| q.appointment == appointment)
    {
        return Ok(None);
    }

    let hospital = appt.hospital;
    let day = appt.appointment_date;
    let same_queue = |q: &&QueueEntry| {
        q.hospital == hospital && q.queue_type == queue_type && q.queue_date == day
    };
    let last_number = tables
        .queue_entries
        .values()
        .filter(same_queue)
        .map(|q| q.queue_number)
        .max()
        .unwrap_or(0);
    let waiting_ahead = tables
        .queue_entries
        .values()
        .filter(same_queue)
        .filter(|q| is_waiting(tables, q))
        .count() as u32;

    let entry = QueueEntry {
        id: RecordId::new(),
        hospital,
        queue_type,
        appointment,
        queue_date: day,
        queue_number: last_number + 1,
        estimated_wait_minutes: waiting_ahead * cfg.minutes_per_patient(queue_type),
        called_at: None,
        created_at: now,
    };
    tracing::info!(
        %hospital,
        queue = %queue_type,
        number = entry.queue_number,
        wait = entry.estimated_wait_minutes,
        "queue number allocated"
    );
    tables.queue_entries.put(entry.clone());
    Ok(Some(entry))
}

/// Input for registering a walk-in patient at the front desk.
#[derive(Debug, Clone)]
pub struct WalkIn {
    pub patient_user: RecordId,
    pub hospital: RecordId,
    pub queue_type: QueueType,
    pub doctor: Option<RecordId>,
    pub department: Option<RecordId>,
    pub reason: String,
    pub priority: Priority,
}

#[derive(Debug, Clone)]
pub struct WalkInOutcome {
    pub appointment: Appointment,
    /// Present once the walk-in has a doctor (status Assigned).
    pub queue_entry: Option<QueueEntry>,
}

#[derive(Clone)]
pub struct QueueService {
    ctx: Arc<CoreContext>,
}

impl QueueService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Registers a same-day walk-in appointment for a patient user.
    ///
    /// The appointment is created as Requested and immediately moved on: to Assigned when a
    /// doctor is given (which allocates its queue number), otherwise to Reviewed.
    ///
    /// # Errors
    ///
    /// - [`CareError::Permission`] unless the actor manages the hospital.
    /// - [`CareError::Validation`] if the hospital does not run the requested queue, the user
    ///   is not a patient, the reason is blank, or the doctor works elsewhere.
    pub fn register_walk_in(&self, actor: &Actor, walk_in: WalkIn) -> CareResult<WalkInOutcome> {
        authorize(actor, Operation::RegisterWalkIn)?;
        let reason = NonEmptyText::new(&walk_in.reason)
            .map_err(|_| CareError::validation("reason for visit is required"))?;
        let now = Utc::now();
        let cfg = self.ctx.cfg().clone();

        let outcome = self.ctx.store().transaction(|t| {
            let scope = AccessScope::resolve(t, actor);
            let hospital = t.hospitals.fetch(walk_in.hospital)?;
            scope.require_managed(hospital.id)?;
            let open = match walk_in.queue_type {
                QueueType::Opd => hospital.opd_open,
                QueueType::Emergency => hospital.emergency_available,
            };
            if !open {
                return Err(CareError::validation(format!(
                    "{} does not accept {} walk-ins",
                    hospital.name, walk_in.queue_type
                )));
            }

            let user = t.users.fetch(walk_in.patient_user)?;
            if user.role != Role::Patient {
                return Err(CareError::validation("walk-ins must be registered for a patient"));
            }
            let patient = ensure_patient_profile(t, walk_in.patient_user, now);

            let appointment_type = match walk_in.queue_type {
                QueueType::Opd => AppointmentType::Opd,
                QueueType::Emergency => AppointmentType::Emergency,
            };
            let appt = Appointment {
                id: RecordId::new(),
                patient,
                hospital: walk_in.hospital,
                department: None,
                doctor: None,
                preferred_doctor: None,
                appointment_type,
                appointment_date: now.date_naive(),
                appointment_time: NaiveTime::from_hms_opt(now.hour(), now.minute(), 0)
                    .unwrap_or_default(),
                status: AppointmentStatus::Requested,
                priority: walk_in.priority,
                reason,
                operations_notes: String::new(),
                reviewed_by: None,
                reviewed_at: None,
                consultation_fee: None,
                platform_commission: Money::ZERO,
                is_walk_in: true,
                notes: String::new(),
                created_at: now,
                updated_at: now,
            };
            let id = appt.id;
            t.appointments.put(appt);

            let queue_entry = if walk_in.doctor.is_some() {
                let assignment = Assignment {
                    doctor: walk_in.doctor,
                    department: walk_in.department,
                    notes: "walk-in".into(),
                };
                apply_assignment(t, &cfg, id, &assignment, actor.user_id, now)?
            } else {
                let appt = t.appointments.fetch_mut(id)?;
                check_transition(appt.status, AppointmentStatus::Reviewed)?;
                appt.status = AppointmentStatus::Reviewed;
                appt.department = walk_in.department;
                appt.reviewed_by = Some(actor.user_id);
                appt.reviewed_at = Some(now);
                None
            };

            Ok(WalkInOutcome {
                appointment: t.appointments.fetch(id)?.clone(),
                queue_entry,
            })
        })?;

        self.ctx.record(
            AuditEvent::new(
                actor,
                "WALK_IN_REGISTERED",
                resource::APPOINTMENT,
                outcome.appointment.id,
            )
            .with_details(serde_json::json!({
                "status": outcome.appointment.status,
                "queue_number": outcome.queue_entry.as_ref().map(|q| q.queue_number),
            })),
        );
        if let Some(doctor) = outcome.appointment.doctor {
            self.ctx.record(
                AuditEvent::new(
                    actor,
                    appointment_action(AppointmentStatus::Assigned),
                    resource::APPOINTMENT,
                    outcome.appointment.id,
                )
                .with_details(serde_json::json!({ "doctor": doctor.to_string() })),
            );
        }
        Ok(outcome)
    }

    /// Calls the lowest-numbered waiting patient in today's queue, skipping entries whose
    /// walk-in has since been cancelled or rescheduled.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::NotFound`] when nobody is waiting.
    pub fn call_next(
        &self,
        actor: &Actor,
        hospital: RecordId,
        queue_type: QueueType,
    ) -> CareResult<QueueEntry> {
        authorize(actor, Operation::CallNextInQueue)?;
        let now = Utc::now();
        let today = now.date_naive();

        let entry = self.ctx.store().transaction(|t| {
            t.hospitals.fetch(hospital)?;
            AccessScope::resolve(t, actor).require_managed(hospital)?;
            let next = t
                .queue_entries
                .values()
                .filter(|q| {
                    q.hospital == hospital
                        && q.queue_type == queue_type
                        && q.queue_date == today
                        && is_waiting(t, q)
                })
                .min_by_key(|q| q.queue_number)
                .map(|q| q.id)
                .ok_or_else(|| {
                    CareError::not_found("waiting patient", format!("{queue_type} queue"))
                })?;
            let entry = t.queue_entries.fetch_mut(next)?;
            entry.called_at = Some(now);
            Ok(entry.clone())
        })?;

        tracing::info!(%hospital, queue = %queue_type, number = entry.queue_number, "called next patient");
        self.ctx.record(
            AuditEvent::new(actor, "QUEUE_CALLED", resource::QUEUE_ENTRY, entry.id)
                .with_details(serde_json::json!({ "queue_number": entry.queue_number })),
        );
        Ok(entry)
    }

    /// Today's entries for one queue, in number order.
    pub fn queue_status(
        &self,
        actor: &Actor,
        hospital: RecordId,
        queue_type: QueueType,
    ) -> CareResult<Vec<QueueEntry>> {
        authorize(actor, Operation::ViewQueue)?;
        let today = Utc::now().date_naive();

        self.ctx.store().read(|t| {
            t.hospitals.fetch(hospital)?;
            let scope = AccessScope::resolve(t, actor);
            if !scope.staff_hospitals.contains(&hospital) {
                return Err(CareError::permission("you do not work at this hospital"));
            }
            let mut entries: Vec<QueueEntry> = t
                .queue_entries
                .values()
                .filter(|q| {
                    q.hospital == hospital && q.queue_type == queue_type && q.queue_date == today
                })
                .cloned()
                .collect();
            entries.sort_by_key(|q| q.queue_number);
            Ok(entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tomorrow, Fixture};

    fn walk_in(fx: &Fixture, queue_type: QueueType, doctor: Option<RecordId>) -> WalkIn {
        WalkIn {
            patient_user: fx.patient.user_id,
            hospital: fx.hospital,
            queue_type,
            doctor,
            department: None,
            reason: "Chest pain".into(),
            priority: Priority::High,
        }
    }

    #[test]
    fn test_walk_ins_get_sequential_numbers_and_waits() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());

        let entries: Vec<QueueEntry> = (0..3)
            .map(|_| {
                svc.register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
                    .expect("register walk-in")
                    .queue_entry
                    .expect("assigned walk-ins are queued")
            })
            .collect();

        let numbers: Vec<u32> = entries.iter().map(|e| e.queue_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let waits: Vec<u32> = entries.iter().map(|e| e.estimated_wait_minutes).collect();
        assert_eq!(waits, vec![0, 10, 20]);
    }

    #[test]
    fn test_walk_in_with_doctor_is_assigned_with_fee() {
        let fx = Fixture::new();
        let outcome = QueueService::new(fx.ctx.clone())
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register walk-in");

        let appt = outcome.appointment;
        assert!(appt.is_walk_in);
        assert_eq!(appt.status, AppointmentStatus::Assigned);
        assert_eq!(appt.consultation_fee.map(|f| f.to_string()).as_deref(), Some("500.00"));
        assert_eq!(appt.platform_commission.to_string(), "25.00");
        assert_eq!(appt.appointment_date, Utc::now().date_naive());
        assert_eq!(
            fx.audit_actions(appt.id),
            vec!["WALK_IN_REGISTERED", "APPOINTMENT_ASSIGNED"]
        );
    }

    #[test]
    fn test_unassigned_walk_in_records_registration_only() {
        let fx = Fixture::new();
        let outcome = QueueService::new(fx.ctx.clone())
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, None))
            .expect("register walk-in");
        assert_eq!(
            fx.audit_actions(outcome.appointment.id),
            vec!["WALK_IN_REGISTERED"]
        );
    }

    #[test]
    fn test_cancelled_walk_in_releases_its_place() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());
        let first = svc
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register first walk-in");
        fx.appointments()
            .cancel(&fx.ops_manager, first.appointment.id, Some("left the clinic"))
            .expect("cancel first walk-in");

        let second = svc
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register second walk-in")
            .queue_entry
            .expect("queued");
        assert_eq!(second.queue_number, 2);
        assert_eq!(second.estimated_wait_minutes, 0);

        let called = svc
            .call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
            .expect("second walk-in is waiting");
        assert_eq!(called.id, second.id);
        let err = svc
            .call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
            .expect_err("cancelled walk-in is never called");
        assert!(matches!(err, CareError::NotFound { .. }));
    }

    #[test]
    fn test_rescheduled_walk_in_is_passed_over() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());
        let first = svc
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register first walk-in");
        let second = svc
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register second walk-in")
            .queue_entry
            .expect("queued");
        fx.appointments()
            .reschedule(
                &fx.ops_manager,
                first.appointment.id,
                tomorrow(),
                NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            )
            .expect("reschedule first walk-in");

        let called = svc
            .call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
            .expect("second walk-in is waiting");
        assert_eq!(called.id, second.id);
    }

    #[test]
    fn test_walk_in_without_doctor_is_queued_on_assignment() {
        let fx = Fixture::new();
        let outcome = QueueService::new(fx.ctx.clone())
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, None))
            .expect("register walk-in");
        assert_eq!(outcome.appointment.status, AppointmentStatus::Reviewed);
        assert!(outcome.queue_entry.is_none());

        fx.appointments()
            .assign(
                &fx.ops_manager,
                outcome.appointment.id,
                Assignment {
                    doctor: Some(fx.doctor_id),
                    ..Default::default()
                },
            )
            .expect("assign walk-in");

        let queued = fx
            .ctx
            .store()
            .read(|t| {
                Ok(t.queue_entries
                    .values()
                    .filter(|q| q.appointment == outcome.appointment.id)
                    .map(|q| q.queue_number)
                    .collect::<Vec<_>>())
            })
            .expect("read");
        assert_eq!(queued, vec![1]);
    }

    #[test]
    fn test_queues_are_numbered_per_type() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());
        let register = |queue_type| {
            svc.register_walk_in(&fx.ops_manager, walk_in(&fx, queue_type, Some(fx.doctor_id)))
                .expect("register walk-in")
                .queue_entry
                .expect("queued")
        };

        assert_eq!(register(QueueType::Opd).queue_number, 1);
        assert_eq!(register(QueueType::Opd).queue_number, 2);
        let first_emergency = register(QueueType::Emergency);
        assert_eq!(first_emergency.queue_number, 1);
        assert_eq!(first_emergency.estimated_wait_minutes, 0);
        let second_emergency = register(QueueType::Emergency);
        assert_eq!(second_emergency.estimated_wait_minutes, 5);
    }

    #[test]
    fn test_call_next_takes_lowest_waiting_and_shortens_wait() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());
        for _ in 0..2 {
            svc.register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
                .expect("register walk-in");
        }

        let called = svc
            .call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
            .expect("someone is waiting");
        assert_eq!(called.queue_number, 1);
        assert!(called.called_at.is_some());

        let third = svc
            .register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register walk-in")
            .queue_entry
            .expect("queued");
        assert_eq!(third.queue_number, 3);
        assert_eq!(third.estimated_wait_minutes, 10);

        assert_eq!(
            svc.call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
                .expect("second")
                .queue_number,
            2
        );
        assert_eq!(
            svc.call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
                .expect("third")
                .queue_number,
            3
        );
        let err = svc
            .call_next(&fx.ops_manager, fx.hospital, QueueType::Opd)
            .expect_err("queue is empty");
        assert!(matches!(err, CareError::NotFound { .. }));
    }

    #[test]
    fn test_walk_in_requires_managed_hospital() {
        let fx = Fixture::new();
        let err = QueueService::new(fx.ctx.clone())
            .register_walk_in(&fx.other_ops_manager, walk_in(&fx, QueueType::Opd, None))
            .expect_err("not this manager's hospital");
        assert!(matches!(err, CareError::Permission(_)));
        assert!(fx.ctx.store().read(|t| Ok(t.appointments.is_empty())).expect("read"));
    }

    #[test]
    fn test_walk_in_rejected_when_queue_closed() {
        let fx = Fixture::new();
        let mut request = walk_in(&fx, QueueType::Emergency, None);
        request.hospital = fx.other_hospital;
        let err = QueueService::new(fx.ctx.clone())
            .register_walk_in(&fx.other_ops_manager, request)
            .expect_err("no emergency department");
        assert!(matches!(err, CareError::Validation(_)));
    }

    #[test]
    fn test_concurrent_walk_ins_never_share_a_number() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());

        let mut numbers: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        svc.register_walk_in(
                            &fx.ops_manager,
                            walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)),
                        )
                        .expect("register walk-in")
                        .queue_entry
                        .expect("queued")
                        .queue_number
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread finished"))
                .collect()
        });
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_queue_status_is_staff_only() {
        let fx = Fixture::new();
        let svc = QueueService::new(fx.ctx.clone());
        svc.register_walk_in(&fx.ops_manager, walk_in(&fx, QueueType::Opd, Some(fx.doctor_id)))
            .expect("register walk-in");

        assert_eq!(
            svc.queue_status(&fx.doctor, fx.hospital, QueueType::Opd)
                .expect("doctor works here")
                .len(),
            1
        );
        let err = svc
            .queue_status(&fx.other_ops_manager, fx.hospital, QueueType::Opd)
            .expect_err("works elsewhere");
        assert!(matches!(err, CareError::Permission(_)));
    }
}
