//! Shared fixture for service tests: one seeded hospital network.

use crate::admin::{AdminService, NewDoctor, NewHospital, NewMedicine, NewUser, StockEntry};
use crate::dispatch::{
    NewPrescription, PrescribedMedicine, PrescriptionDetail, PrescriptionService,
    RecommendedTest,
};
use crate::model::{Appointment, AppointmentType, Hospital, PharmacyMedicine, Role};
use crate::store::TableExt;
use crate::workflow::{AppointmentService, Assignment, NewAppointment};
use crate::{Actor, CoreConfig, CoreContext, RecordId};
use carelink_types::Money;
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;

pub(crate) struct Fixture {
    pub ctx: Arc<CoreContext>,
    pub super_admin: Actor,
    pub ops_manager: Actor,
    pub other_ops_manager: Actor,
    pub patient: Actor,
    pub other_patient: Actor,
    pub doctor: Actor,
    pub doctor_id: RecordId,
    pub other_doctor: Actor,
    pub other_doctor_id: RecordId,
    pub nurse: Actor,
    pub pharmacy_admin: Actor,
    pub lab_admin: Actor,
    /// Commission rate 5%, OPD and emergency open.
    pub hospital: RecordId,
    pub other_hospital: RecordId,
    pub medicine_a: RecordId,
    pub medicine_b: RecordId,
    pub pharmacy: RecordId,
    pub lab: RecordId,
    pub lab_test: RecordId,
}

fn actor(user: &crate::model::User) -> Actor {
    Actor {
        user_id: user.id,
        role: user.role,
        origin: Some("127.0.0.1".into()),
    }
}

pub(crate) fn tomorrow() -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(1))
        .expect("date in range")
}

pub(crate) fn money(value: &str) -> Money {
    value.parse().expect("valid money")
}

impl Fixture {
    pub fn new() -> Self {
        let ctx = Arc::new(CoreContext::in_memory(Arc::new(CoreConfig::default())));
        let admin = AdminService::new(ctx.clone());

        let root = admin
            .bootstrap_super_admin(NewUser {
                email: "root@carelink.test".into(),
                first_name: "Root".into(),
                last_name: "Admin".into(),
                phone: None,
                role: Role::SuperAdmin,
            })
            .expect("bootstrap super admin");
        let super_admin = actor(&root);

        let register = |email: &str, role: Role| {
            let user = admin
                .register_user(
                    &super_admin,
                    NewUser {
                        email: email.into(),
                        first_name: "Test".into(),
                        last_name: role.as_str().into(),
                        phone: None,
                        role,
                    },
                )
                .expect("register user");
            actor(&user)
        };

        let ops_manager = register("ops@carelink.test", Role::OperationsManager);
        let other_ops_manager = register("ops2@carelink.test", Role::OperationsManager);
        let patient = register("patient@carelink.test", Role::Patient);
        let other_patient = register("patient2@carelink.test", Role::Patient);
        let doctor = register("doctor@carelink.test", Role::Doctor);
        let other_doctor = register("doctor2@carelink.test", Role::Doctor);
        let nurse = register("nurse@carelink.test", Role::Nurse);
        let pharmacy_admin = register("pharmacy@carelink.test", Role::PharmacyAdmin);
        let lab_admin = register("lab@carelink.test", Role::LabAdmin);

        let hospital = admin
            .create_hospital(
                &super_admin,
                NewHospital {
                    name: "Sunrise General".into(),
                    city: "Pune".into(),
                    state: "MH".into(),
                    operations_manager: Some(ops_manager.user_id),
                    opd_open: true,
                    emergency_available: true,
                    ..Default::default()
                },
            )
            .expect("create hospital")
            .id;
        let other_hospital = admin
            .create_hospital(
                &super_admin,
                NewHospital {
                    name: "Lakeside Clinic".into(),
                    city: "Nagpur".into(),
                    state: "MH".into(),
                    operations_manager: Some(other_ops_manager.user_id),
                    opd_open: true,
                    ..Default::default()
                },
            )
            .expect("create other hospital")
            .id;

        let make_doctor = |user: &Actor, fee: &str| {
            admin
                .create_doctor(
                    &super_admin,
                    NewDoctor {
                        user: user.user_id,
                        hospital,
                        department: None,
                        specialization: "General Medicine".into(),
                        license_number: format!("LIC-{}", user.user_id),
                        consultation_fee: money(fee),
                    },
                )
                .expect("create doctor")
                .id
        };
        let doctor_id = make_doctor(&doctor, "500");
        let other_doctor_id = make_doctor(&other_doctor, "800");

        let make_medicine = |name: &str| {
            admin
                .create_medicine(
                    &super_admin,
                    NewMedicine {
                        name: name.into(),
                        requires_prescription: true,
                        ..Default::default()
                    },
                )
                .expect("create medicine")
                .id
        };
        let medicine_a = make_medicine("Amoxicillin 500mg");
        let medicine_b = make_medicine("Paracetamol 650mg");

        let pharmacy = admin
            .create_pharmacy(&super_admin, pharmacy_admin.user_id, "Apollo Pharmacy", "Pune")
            .expect("create pharmacy")
            .id;
        let lab = admin
            .create_lab(&super_admin, lab_admin.user_id, "Metro Diagnostics", "Pune")
            .expect("create lab")
            .id;
        let lab_test = admin
            .create_lab_test(&super_admin, lab, "Complete Blood Count", money("350"))
            .expect("create lab test")
            .id;

        Self {
            ctx,
            super_admin,
            ops_manager,
            other_ops_manager,
            patient,
            other_patient,
            doctor,
            doctor_id,
            other_doctor,
            other_doctor_id,
            nurse,
            pharmacy_admin,
            lab_admin,
            hospital,
            other_hospital,
            medicine_a,
            medicine_b,
            pharmacy,
            lab,
            lab_test,
        }
    }

    pub fn appointments(&self) -> AppointmentService {
        AppointmentService::new(self.ctx.clone())
    }

    pub fn hospital_record(&self) -> Hospital {
        self.ctx
            .store()
            .read(|t| Ok(t.hospitals.fetch(self.hospital)?.clone()))
            .expect("hospital exists")
    }

    pub fn appointment(&self, id: RecordId) -> Appointment {
        self.ctx
            .store()
            .read(|t| Ok(t.appointments.fetch(id)?.clone()))
            .expect("appointment exists")
    }

    pub fn stock(&self, medicine: RecordId, quantity: u32, price: &str) -> PharmacyMedicine {
        AdminService::new(self.ctx.clone())
            .stock_medicine(
                &self.pharmacy_admin,
                StockEntry {
                    pharmacy: self.pharmacy,
                    medicine,
                    stock_quantity: quantity,
                    price_per_unit: money(price),
                    is_available: true,
                },
            )
            .expect("stock medicine")
    }

    pub fn new_appointment(&self, date: NaiveDate) -> NewAppointment {
        NewAppointment {
            hospital: self.hospital,
            department: None,
            preferred_doctor: None,
            appointment_type: AppointmentType::Opd,
            appointment_date: date,
            appointment_time: NaiveTime::from_hms_opt(10, 30, 0).expect("valid time"),
            reason: "Persistent cough".into(),
            priority: None,
            notes: String::new(),
        }
    }

    /// A Requested appointment at the fixture hospital for tomorrow.
    pub fn book(&self) -> Appointment {
        self.appointments()
            .create(&self.patient, self.new_appointment(tomorrow()))
            .expect("book appointment")
    }

    /// A booked appointment assigned to the fixture doctor.
    pub fn assigned(&self) -> Appointment {
        let booked = self.book();
        self.appointments()
            .assign(
                &self.ops_manager,
                booked.id,
                Assignment {
                    doctor: Some(self.doctor_id),
                    ..Default::default()
                },
            )
            .expect("assign appointment")
    }

    /// An assigned appointment with a prescription: 10 of medicine A, 4 of medicine B and a
    /// blood count recommendation. The appointment ends up Completed.
    pub fn prescribed(&self) -> (Appointment, PrescriptionDetail) {
        let appt = self.assigned();
        let line = |medicine, quantity| PrescribedMedicine {
            medicine,
            dosage: "1 tab".into(),
            frequency: "BD".into(),
            duration: "5 days".into(),
            instructions: String::new(),
            quantity,
        };
        let detail = PrescriptionService::new(self.ctx.clone())
            .create(
                &self.doctor,
                NewPrescription {
                    appointment: appt.id,
                    diagnosis: "Upper respiratory infection".into(),
                    notes: String::new(),
                    medicines: vec![line(self.medicine_a, 10), line(self.medicine_b, 4)],
                    lab_tests: vec![RecommendedTest {
                        test_name: "Complete Blood Count".into(),
                        description: "baseline".into(),
                    }],
                },
            )
            .expect("write prescription");
        (self.appointment(appt.id), detail)
    }

    pub fn audit_actions(&self, resource_id: RecordId) -> Vec<String> {
        self.ctx
            .audit()
            .entries()
            .into_iter()
            .filter(|e| e.resource_id == resource_id.to_string())
            .map(|e| e.action)
            .collect()
    }
}
