//! # API REST
//!
//! REST API for CareLink.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - bearer-token authentication of every non-health route
//! - mapping core errors to HTTP status codes
//! - OpenAPI/Swagger documentation
//!
//! Uses `api-shared` for request/response bodies and `carelink-core` for all behaviour.
//! Core operations are synchronous and run directly inside the handlers.

#![warn(rust_2018_idioms)]

mod error;
mod extract;
mod handlers;

pub use error::ApiError;
pub use extract::CurrentActor;

use api_shared as dto;
use axum::{
    routing::{get, patch, post},
    Router,
};
use carelink_core::CoreContext;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<CoreContext>,
}

impl AppState {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::general::health,
        handlers::general::my_notifications,
        handlers::appointments::list_appointments,
        handlers::appointments::create_appointment,
        handlers::appointments::get_appointment,
        handlers::appointments::update_appointment,
        handlers::appointments::patient_appointments,
        handlers::appointments::doctor_appointments,
        handlers::operations::operations_queue,
        handlers::operations::assign_appointment,
        handlers::operations::register_walk_in,
        handlers::operations::queue_status,
        handlers::operations::call_next,
        handlers::clinical::list_prescriptions,
        handlers::clinical::create_prescription,
        handlers::clinical::get_prescription,
        handlers::clinical::record_visit,
        handlers::clinical::add_vitals,
        handlers::clinical::patient_history,
        handlers::orders::create_pharmacy_order,
        handlers::orders::update_pharmacy_order,
        handlers::orders::create_lab_request,
        handlers::orders::update_lab_request,
        handlers::orders::upload_lab_report,
        handlers::payments::create_payment,
        handlers::payments::process_payment,
        handlers::payments::issue_invoice,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ErrorRes,
        dto::UpdateStatusReq,
        dto::AppointmentRes,
        dto::CreateAppointmentReq,
        dto::UpdateAppointmentReq,
        dto::AssignAppointmentReq,
        dto::QueueEntryRes,
        dto::WalkInReq,
        dto::WalkInRes,
        dto::PrescribedMedicineReq,
        dto::RecommendedTestReq,
        dto::CreatePrescriptionReq,
        dto::PrescriptionMedicineRes,
        dto::LabRecommendationRes,
        dto::PrescriptionRes,
        dto::CreatePharmacyOrderReq,
        dto::OrderItemRes,
        dto::SkippedLineRes,
        dto::PharmacyInvoiceRes,
        dto::PharmacyOrderRes,
        dto::CreateLabRequestReq,
        dto::LabRequestRes,
        dto::UploadLabReportReq,
        dto::LabReportRes,
        dto::CreateEmrReq,
        dto::VitalsReq,
        dto::VitalsRes,
        dto::EmrRes,
        dto::CreatePaymentReq,
        dto::PaymentRes,
        dto::PaymentInvoiceRes,
        dto::NotificationRes,
    )),
    modifiers(&BearerAuth),
    security(("bearer" = []))
)]
pub struct ApiDoc;

struct BearerAuth;

impl utoipa::Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Builds the full REST router: API routes, Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    use handlers::{appointments, clinical, general, operations, orders, payments};

    Router::new()
        .route("/health", get(general::health))
        .route("/notifications", get(general::my_notifications))
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment).patch(appointments::update_appointment),
        )
        .route("/patients/me/appointments", get(appointments::patient_appointments))
        .route("/doctors/me/appointments", get(appointments::doctor_appointments))
        .route("/operations/appointments", get(operations::operations_queue))
        .route(
            "/operations/appointments/:id/assign",
            post(operations::assign_appointment),
        )
        .route("/operations/walk-ins", post(operations::register_walk_in))
        .route(
            "/operations/queues/:hospital_id/:queue_type",
            get(operations::queue_status),
        )
        .route(
            "/operations/queues/:hospital_id/:queue_type/call",
            post(operations::call_next),
        )
        .route(
            "/prescriptions",
            get(clinical::list_prescriptions).post(clinical::create_prescription),
        )
        .route("/prescriptions/:id", get(clinical::get_prescription))
        .route("/emr", post(clinical::record_visit))
        .route("/emr/:id/vitals", post(clinical::add_vitals))
        .route("/emr/patients/:patient_id", get(clinical::patient_history))
        .route("/pharmacy/orders", post(orders::create_pharmacy_order))
        .route("/pharmacy/orders/:id", patch(orders::update_pharmacy_order))
        .route("/labs/requests", post(orders::create_lab_request))
        .route("/labs/requests/:id", patch(orders::update_lab_request))
        .route("/labs/requests/:id/report", post(orders::upload_lab_report))
        .route("/payments", post(payments::create_payment))
        .route("/payments/:id/process", post(payments::process_payment))
        .route("/payments/:id/invoice", post(payments::issue_invoice))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
