//! Appointment requests and the caller-centric appointment lists.

use crate::error::ApiResult;
use crate::{AppState, CurrentActor};
use api_shared::{
    parse, AppointmentListQuery, AppointmentRes, CreateAppointmentReq, ErrorRes,
    UpdateAppointmentReq,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use carelink_core::workflow::{AppointmentFilter, AppointmentService};
use carelink_core::model::Appointment;

fn appointments(state: &AppState) -> AppointmentService {
    AppointmentService::new(state.ctx.clone())
}

fn to_res(found: Vec<Appointment>) -> Json<Vec<AppointmentRes>> {
    Json(found.into_iter().map(Into::into).collect())
}

#[utoipa::path(
    get,
    path = "/appointments",
    params(AppointmentListQuery),
    responses(
        (status = 200, description = "Appointments visible to the caller", body = [AppointmentRes]),
        (status = 400, description = "Bad filter", body = ErrorRes),
        (status = 401, description = "Missing or unknown token", body = ErrorRes)
    )
)]
/// List appointments within the caller's access scope
///
/// Patients see their own, doctors their assigned appointments and hospital staff those of
/// the hospitals they manage.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<AppointmentListQuery>,
) -> ApiResult<Json<Vec<AppointmentRes>>> {
    let filter = AppointmentFilter::try_from(query)?;
    Ok(to_res(appointments(&state).list(&actor, &filter)?))
}

#[utoipa::path(
    post,
    path = "/appointments",
    request_body = CreateAppointmentReq,
    responses(
        (status = 201, description = "Appointment requested", body = AppointmentRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 403, description = "Only patients may request appointments", body = ErrorRes),
        (status = 404, description = "Unknown hospital, department or doctor", body = ErrorRes)
    )
)]
/// Request an appointment
///
/// The appointment starts in `REQUESTED` with no doctor and no fee. A preferred doctor is
/// recorded as a hint for the operations team only.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateAppointmentReq>,
) -> ApiResult<(StatusCode, Json<AppointmentRes>)> {
    let created = appointments(&state).create(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/appointments/{id}",
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "The appointment", body = AppointmentRes),
        (status = 403, description = "Outside the caller's scope", body = ErrorRes),
        (status = 404, description = "No such appointment", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<AppointmentRes>> {
    let id = parse::id("id", &id)?;
    Ok(Json(appointments(&state).get(&actor, id)?.into()))
}

#[utoipa::path(
    patch,
    path = "/appointments/{id}",
    params(("id" = String, Path, description = "Appointment id")),
    request_body = UpdateAppointmentReq,
    responses(
        (status = 200, description = "Updated appointment", body = AppointmentRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 403, description = "Change not permitted for the caller's role", body = ErrorRes),
        (status = 404, description = "No such appointment", body = ErrorRes),
        (status = 409, description = "Status transition not allowed", body = ErrorRes)
    )
)]
/// Update an appointment
///
/// Which fields apply depends on the caller: patients may edit their own requested
/// appointments, doctors move their appointments through the clinical statuses and
/// operations staff may confirm, cancel or reschedule.
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateAppointmentReq>,
) -> ApiResult<Json<AppointmentRes>> {
    let id = parse::id("id", &id)?;
    let updated = appointments(&state).update(&actor, id, req.try_into()?)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/patients/me/appointments",
    responses(
        (status = 200, description = "The calling patient's appointments, newest first", body = [AppointmentRes]),
        (status = 403, description = "Caller is not a patient", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn patient_appointments(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<AppointmentRes>>> {
    Ok(to_res(appointments(&state).patient_appointments(&actor)?))
}

#[utoipa::path(
    get,
    path = "/doctors/me/appointments",
    responses(
        (status = 200, description = "The calling doctor's appointments, soonest first", body = [AppointmentRes]),
        (status = 403, description = "Caller is not a doctor", body = ErrorRes),
        (status = 404, description = "Caller has no doctor profile", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn doctor_appointments(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<AppointmentRes>>> {
    Ok(to_res(appointments(&state).doctor_appointments(&actor)?))
}
