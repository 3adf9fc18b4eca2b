//! Administrative set-up: users, hospitals, doctors, catalogs, pharmacies and labs.
//!
//! These operations populate the store for the workflows. All are super-admin only, except
//! stocking a pharmacy, which its own admin may also do.

use crate::audit::AuditEvent;
use crate::constants::{resource, DEFAULT_COMMISSION_RATE};
use crate::identity::Actor;
use crate::model::{
    Department, Doctor, Hospital, Lab, LabTest, Medicine, Pharmacy, PharmacyMedicine, Role, User,
};
use crate::policy::{authorize, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::{Money, NonEmptyText, Percentage};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct NewHospital {
    pub name: String,
    pub city: String,
    pub state: String,
    pub operations_manager: Option<RecordId>,
    pub director: Option<RecordId>,
    pub admin: Option<RecordId>,
    /// Defaults to 5%.
    pub commission_rate: Option<Percentage>,
    pub opd_open: bool,
    pub emergency_available: bool,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub user: RecordId,
    pub hospital: RecordId,
    pub department: Option<RecordId>,
    pub specialization: String,
    pub license_number: String,
    pub consultation_fee: Money,
}

#[derive(Debug, Clone, Default)]
pub struct NewMedicine {
    pub name: String,
    pub generic_name: String,
    pub manufacturer: String,
    pub requires_prescription: bool,
}

#[derive(Debug, Clone)]
pub struct StockEntry {
    pub pharmacy: RecordId,
    pub medicine: RecordId,
    pub stock_quantity: u32,
    pub price_per_unit: Money,
    pub is_available: bool,
}

fn text(value: &str, field: &str) -> CareResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| CareError::validation(format!("{field} is required")))
}

fn require_role(tables: &Tables, user: RecordId, role: Role) -> CareResult<()> {
    let found = tables.users.fetch(user)?.role;
    if found != role {
        return Err(CareError::validation(format!(
            "user {user} has role {found}, expected {role}"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AdminService {
    ctx: Arc<CoreContext>,
}

impl AdminService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Creates the first super admin. Requires no actor.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::StateConflict`] once any super admin exists.
    pub fn bootstrap_super_admin(&self, mut new_user: NewUser) -> CareResult<User> {
        new_user.role = Role::SuperAdmin;
        let user = self.ctx.store().transaction(|t| {
            if t.users.values().any(|u| u.role == Role::SuperAdmin) {
                return Err(CareError::conflict("a super admin already exists"));
            }
            insert_user(t, new_user)
        })?;
        tracing::info!(user = %user.id, "bootstrapped super admin");
        Ok(user)
    }

    /// Registers an account with a freshly issued API token.
    pub fn register_user(&self, actor: &Actor, new_user: NewUser) -> CareResult<User> {
        authorize(actor, Operation::Administer)?;
        let user = self.ctx.store().transaction(|t| insert_user(t, new_user))?;
        tracing::info!(user = %user.id, role = %user.role, "registered user");
        self.ctx
            .record(AuditEvent::new(actor, "USER_REGISTERED", resource::USER, user.id));
        Ok(user)
    }

    pub fn create_hospital(&self, actor: &Actor, new: NewHospital) -> CareResult<Hospital> {
        authorize(actor, Operation::Administer)?;
        let name = text(&new.name, "hospital name")?;
        let hospital = self.ctx.store().transaction(|t| {
            if let Some(manager) = new.operations_manager {
                require_role(t, manager, Role::OperationsManager)?;
            }
            if let Some(director) = new.director {
                require_role(t, director, Role::HospitalDirector)?;
            }
            if let Some(admin) = new.admin {
                require_role(t, admin, Role::HospitalAdmin)?;
            }
            let hospital = Hospital {
                id: RecordId::new(),
                name,
                city: new.city.trim().to_string(),
                state: new.state.trim().to_string(),
                operations_manager: new.operations_manager,
                director: new.director,
                admin: new.admin,
                opd_open: new.opd_open,
                emergency_available: new.emergency_available,
                is_active: true,
                is_approved: true,
                commission_rate: match new.commission_rate {
                    Some(rate) => rate,
                    None => Percentage::new(DEFAULT_COMMISSION_RATE)?,
                },
                created_at: Utc::now(),
            };
            t.hospitals.put(hospital.clone());
            Ok(hospital)
        })?;
        self.ctx.record(AuditEvent::new(
            actor,
            "HOSPITAL_CREATED",
            resource::HOSPITAL,
            hospital.id,
        ));
        Ok(hospital)
    }

    pub fn create_department(
        &self,
        actor: &Actor,
        hospital: RecordId,
        name: &str,
    ) -> CareResult<Department> {
        authorize(actor, Operation::Administer)?;
        let name = text(name, "department name")?;
        self.ctx.store().transaction(|t| {
            t.hospitals.fetch(hospital)?;
            let department = Department {
                id: RecordId::new(),
                hospital,
                name,
                is_active: true,
            };
            t.departments.put(department.clone());
            Ok(department)
        })
    }

    /// Creates the doctor profile for a doctor-role user. One profile per user.
    pub fn create_doctor(&self, actor: &Actor, new: NewDoctor) -> CareResult<Doctor> {
        authorize(actor, Operation::Administer)?;
        self.ctx.store().transaction(|t| {
            require_role(t, new.user, Role::Doctor)?;
            t.hospitals.fetch(new.hospital)?;
            if t.doctor_for_user(new.user).is_some() {
                return Err(CareError::conflict("user already has a doctor profile"));
            }
            if let Some(department) = new.department {
                if t.departments.fetch(department)?.hospital != new.hospital {
                    return Err(CareError::validation(
                        "department does not belong to this hospital",
                    ));
                }
            }
            let doctor = Doctor {
                id: RecordId::new(),
                user: new.user,
                hospital: new.hospital,
                department: new.department,
                specialization: new.specialization.trim().to_string(),
                license_number: new.license_number.trim().to_string(),
                consultation_fee: new.consultation_fee,
                is_active: true,
                is_approved: true,
            };
            t.doctors.put(doctor.clone());
            Ok(doctor)
        })
    }

    pub fn create_medicine(&self, actor: &Actor, new: NewMedicine) -> CareResult<Medicine> {
        authorize(actor, Operation::Administer)?;
        let medicine = Medicine {
            id: RecordId::new(),
            name: text(&new.name, "medicine name")?,
            generic_name: new.generic_name.trim().to_string(),
            manufacturer: new.manufacturer.trim().to_string(),
            requires_prescription: new.requires_prescription,
        };
        self.ctx.store().transaction(|t| {
            t.medicines.put(medicine.clone());
            Ok(medicine)
        })
    }

    pub fn create_pharmacy(
        &self,
        actor: &Actor,
        admin: RecordId,
        name: &str,
        city: &str,
    ) -> CareResult<Pharmacy> {
        authorize(actor, Operation::Administer)?;
        let name = text(name, "pharmacy name")?;
        self.ctx.store().transaction(|t| {
            require_role(t, admin, Role::PharmacyAdmin)?;
            let pharmacy = Pharmacy {
                id: RecordId::new(),
                admin,
                name,
                city: city.trim().to_string(),
                is_active: true,
                is_approved: true,
            };
            t.pharmacies.put(pharmacy.clone());
            Ok(pharmacy)
        })
    }

    /// Sets a pharmacy's stock row for a medicine, creating it on first use.
    pub fn stock_medicine(&self, actor: &Actor, entry: StockEntry) -> CareResult<PharmacyMedicine> {
        authorize(actor, Operation::StockMedicine)?;
        self.ctx.store().transaction(|t| {
            t.pharmacies.fetch(entry.pharmacy)?;
            t.medicines.fetch(entry.medicine)?;
            let scope = AccessScope::resolve(t, actor);
            if !scope.is_super_admin() && scope.pharmacy != Some(entry.pharmacy) {
                return Err(CareError::permission("you do not administer this pharmacy"));
            }

            let existing = t
                .pharmacy_stock
                .values()
                .find(|s| s.pharmacy == entry.pharmacy && s.medicine == entry.medicine)
                .map(|s| s.id);
            let stock = PharmacyMedicine {
                id: existing.unwrap_or_default(),
                pharmacy: entry.pharmacy,
                medicine: entry.medicine,
                stock_quantity: entry.stock_quantity,
                price_per_unit: entry.price_per_unit,
                is_available: entry.is_available,
            };
            t.pharmacy_stock.put(stock.clone());
            Ok(stock)
        })
    }

    pub fn create_lab(&self, actor: &Actor, admin: RecordId, name: &str, city: &str) -> CareResult<Lab> {
        authorize(actor, Operation::Administer)?;
        let name = text(name, "lab name")?;
        self.ctx.store().transaction(|t| {
            require_role(t, admin, Role::LabAdmin)?;
            let lab = Lab {
                id: RecordId::new(),
                admin,
                name,
                city: city.trim().to_string(),
                is_active: true,
                is_approved: true,
            };
            t.labs.put(lab.clone());
            Ok(lab)
        })
    }

    pub fn create_lab_test(
        &self,
        actor: &Actor,
        lab: RecordId,
        name: &str,
        price: Money,
    ) -> CareResult<LabTest> {
        authorize(actor, Operation::Administer)?;
        let name = text(name, "test name")?;
        self.ctx.store().transaction(|t| {
            t.labs.fetch(lab)?;
            let test = LabTest {
                id: RecordId::new(),
                lab,
                name,
                price,
                is_available: true,
            };
            t.lab_tests.put(test.clone());
            Ok(test)
        })
    }
}

fn insert_user(tables: &mut Tables, new_user: NewUser) -> CareResult<User> {
    let email = new_user.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(CareError::validation(format!("invalid email address '{email}'")));
    }
    if tables.users.values().any(|u| u.email == email) {
        return Err(CareError::conflict(format!("{email} is already registered")));
    }
    let user = User {
        id: RecordId::new(),
        email,
        first_name: text(&new_user.first_name, "first name")?,
        last_name: text(&new_user.last_name, "last name")?,
        phone: new_user
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        role: new_user.role,
        api_token: RecordId::new().to_string(),
        is_active: true,
        created_at: Utc::now(),
    };
    tables.users.put(user.clone());
    Ok(user)
}
