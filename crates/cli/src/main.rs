use anyhow::Context;
use api_shared::{
    parse, AppointmentListQuery, AppointmentRes, AssignAppointmentReq, CreateAppointmentReq,
};
use carelink_core::admin::{AdminService, NewDoctor, NewHospital, NewUser};
use carelink_core::model::{Role, User};
use carelink_core::workflow::{AppointmentFilter, AppointmentService};
use carelink_core::{Actor, CoreConfig, CoreContext};
use carelink_types::Percentage;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "carelink")]
#[command(about = "CareLink healthcare operations CLI")]
struct Cli {
    /// Directory holding the store snapshot and audit log
    #[arg(long, global = true, default_value = "carelink-data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the first super admin and print their token
    Bootstrap {
        email: String,
        first_name: String,
        last_name: String,
    },
    /// Register a user with any role (super admin only)
    RegisterUser {
        /// Acting user's API token
        #[arg(long)]
        token: String,
        email: String,
        first_name: String,
        last_name: String,
        /// Role wire name, e.g. OPERATIONS_MANAGER
        role: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Create a hospital (super admin only)
    CreateHospital {
        #[arg(long)]
        token: String,
        name: String,
        city: String,
        #[arg(long, default_value = "")]
        state: String,
        /// User id of the operations manager
        #[arg(long)]
        operations_manager: Option<String>,
        /// Commission percentage; defaults to 5
        #[arg(long)]
        commission_rate: Option<String>,
        #[arg(long)]
        opd_open: bool,
        #[arg(long)]
        emergency: bool,
    },
    /// Create a doctor profile for an existing DOCTOR user
    CreateDoctor {
        #[arg(long)]
        token: String,
        user_id: String,
        hospital_id: String,
        /// Consultation fee, e.g. 500.00
        fee: String,
        #[arg(long, default_value = "General Medicine")]
        specialization: String,
        #[arg(long, default_value = "")]
        license_number: String,
    },
    /// List the appointments visible to the acting user
    Appointments {
        #[arg(long)]
        token: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        upcoming: bool,
    },
    /// Request an appointment as a patient
    Book {
        #[arg(long)]
        token: String,
        hospital_id: String,
        /// YYYY-MM-DD
        date: String,
        /// HH:MM
        time: String,
        reason: String,
        #[arg(long, default_value = "OPD")]
        appointment_type: String,
        #[arg(long)]
        preferred_doctor: Option<String>,
    },
    /// Assign a doctor to an appointment as its hospital's operations manager
    Assign {
        #[arg(long)]
        token: String,
        appointment_id: String,
        doctor_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Print the audit trail, optionally for one resource
    Audit {
        /// Resource type, e.g. Appointment
        #[arg(long)]
        resource_type: Option<String>,
        #[arg(long)]
        resource_id: Option<String>,
    },
}

fn open(data_dir: PathBuf) -> anyhow::Result<Arc<CoreContext>> {
    let cfg = CoreConfig::new(
        Some(data_dir.clone()),
        CoreConfig::default().pharmacy_tax_rate(),
        carelink_core::constants::DEFAULT_OPD_MINUTES_PER_PATIENT,
        carelink_core::constants::DEFAULT_EMERGENCY_MINUTES_PER_PATIENT,
    )?;
    let ctx = CoreContext::open(Arc::new(cfg))
        .with_context(|| format!("opening store in {}", data_dir.display()))?;
    Ok(Arc::new(ctx))
}

fn login(ctx: &CoreContext, token: &str) -> anyhow::Result<Actor> {
    ctx.identity()
        .authenticate(token, None)
        .context("token does not belong to an active user")
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id.to_string(),
        "email": user.email,
        "role": user.role.as_str(),
        "api_token": user.api_token,
    })
}

fn print(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Try --help.");
        return Ok(());
    };
    let ctx = open(cli.data_dir)?;
    let admin = AdminService::new(ctx.clone());

    match command {
        Commands::Bootstrap {
            email,
            first_name,
            last_name,
        } => {
            let user = admin.bootstrap_super_admin(NewUser {
                email,
                first_name,
                last_name,
                phone: None,
                role: Role::SuperAdmin,
            })?;
            print(&user_json(&user))?;
        }
        Commands::RegisterUser {
            token,
            email,
            first_name,
            last_name,
            role,
            phone,
        } => {
            let actor = login(&ctx, &token)?;
            let role: Role = parse::wire(&role)?;
            let user = admin.register_user(
                &actor,
                NewUser {
                    email,
                    first_name,
                    last_name,
                    phone,
                    role,
                },
            )?;
            print(&user_json(&user))?;
        }
        Commands::CreateHospital {
            token,
            name,
            city,
            state,
            operations_manager,
            commission_rate,
            opd_open,
            emergency,
        } => {
            let actor = login(&ctx, &token)?;
            let commission_rate = commission_rate
                .map(|r| r.parse::<Percentage>())
                .transpose()
                .context("commission rate must be a percentage between 0 and 100")?;
            let hospital = admin.create_hospital(
                &actor,
                NewHospital {
                    name,
                    city,
                    state,
                    operations_manager: parse::optional_id(
                        "operations_manager",
                        operations_manager.as_deref(),
                    )?,
                    director: None,
                    admin: None,
                    commission_rate,
                    opd_open,
                    emergency_available: emergency,
                },
            )?;
            print(&json!({
                "id": hospital.id.to_string(),
                "name": hospital.name.as_str(),
                "commission_rate": hospital.commission_rate.to_string(),
            }))?;
        }
        Commands::CreateDoctor {
            token,
            user_id,
            hospital_id,
            fee,
            specialization,
            license_number,
        } => {
            let actor = login(&ctx, &token)?;
            let doctor = admin.create_doctor(
                &actor,
                NewDoctor {
                    user: parse::id("user_id", &user_id)?,
                    hospital: parse::id("hospital_id", &hospital_id)?,
                    department: None,
                    specialization,
                    license_number,
                    consultation_fee: parse::money("fee", &fee)?,
                },
            )?;
            print(&json!({
                "id": doctor.id.to_string(),
                "hospital_id": doctor.hospital.to_string(),
                "consultation_fee": doctor.consultation_fee.to_string(),
            }))?;
        }
        Commands::Appointments {
            token,
            status,
            upcoming,
        } => {
            let actor = login(&ctx, &token)?;
            let filter = AppointmentFilter::try_from(AppointmentListQuery {
                status,
                upcoming: Some(upcoming),
                ..Default::default()
            })?;
            let found: Vec<AppointmentRes> = AppointmentService::new(ctx.clone())
                .list(&actor, &filter)?
                .into_iter()
                .map(Into::into)
                .collect();
            print(&found)?;
        }
        Commands::Book {
            token,
            hospital_id,
            date,
            time,
            reason,
            appointment_type,
            preferred_doctor,
        } => {
            let actor = login(&ctx, &token)?;
            let request = CreateAppointmentReq {
                hospital_id,
                department_id: None,
                preferred_doctor_id: preferred_doctor,
                appointment_type,
                appointment_date: date,
                appointment_time: time,
                reason,
                priority: None,
                notes: None,
            };
            let created = AppointmentService::new(ctx.clone()).create(&actor, request.try_into()?)?;
            print(&AppointmentRes::from(created))?;
        }
        Commands::Assign {
            token,
            appointment_id,
            doctor_id,
            notes,
        } => {
            let actor = login(&ctx, &token)?;
            let id = parse::id("appointment_id", &appointment_id)?;
            let assignment = AssignAppointmentReq {
                doctor_id: Some(doctor_id),
                department_id: None,
                notes,
            };
            let assigned =
                AppointmentService::new(ctx.clone()).assign(&actor, id, assignment.try_into()?)?;
            print(&AppointmentRes::from(assigned))?;
        }
        Commands::Audit {
            resource_type,
            resource_id,
        } => {
            let entries = match (resource_type, resource_id) {
                (Some(kind), Some(id)) => ctx.audit().for_resource(&kind, &id),
                (Some(kind), None) => ctx
                    .audit()
                    .entries()
                    .into_iter()
                    .filter(|e| e.resource_type == kind)
                    .collect(),
                (None, _) => ctx.audit().entries(),
            };
            for entry in entries {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }

    Ok(())
}
