//! Operations desk: the review queue, doctor assignment, walk-ins and same-day queues.

use crate::error::ApiResult;
use crate::{AppState, CurrentActor};
use api_shared::{
    parse, AppointmentRes, AssignAppointmentReq, ErrorRes, OperationsQueueQuery, QueueEntryRes,
    WalkInReq, WalkInRes,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use carelink_core::model::QueueType;
use carelink_core::workflow::{AppointmentService, QueueService};
use carelink_core::RecordId;

fn queue_path(hospital_id: &str, queue_type: &str) -> ApiResult<(RecordId, QueueType)> {
    Ok((
        parse::id("hospital_id", hospital_id)?,
        parse::wire(queue_type)?,
    ))
}

#[utoipa::path(
    get,
    path = "/operations/appointments",
    params(OperationsQueueQuery),
    responses(
        (status = 200, description = "Appointments awaiting review at the caller's hospitals", body = [AppointmentRes]),
        (status = 403, description = "Caller is not operations staff", body = ErrorRes),
        (status = 404, description = "Caller manages no hospital", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn operations_queue(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<OperationsQueueQuery>,
) -> ApiResult<Json<Vec<AppointmentRes>>> {
    let status = parse::optional_wire(query.status.as_deref())?;
    let found = AppointmentService::new(state.ctx.clone()).operations_queue(&actor, status)?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/operations/appointments/{id}/assign",
    params(("id" = String, Path, description = "Appointment id")),
    request_body = AssignAppointmentReq,
    responses(
        (status = 200, description = "Doctor assigned; fee and commission derived", body = AppointmentRes),
        (status = 400, description = "Doctor missing or from another hospital", body = ErrorRes),
        (status = 403, description = "Caller does not manage this hospital", body = ErrorRes),
        (status = 404, description = "No such appointment or doctor", body = ErrorRes),
        (status = 409, description = "Appointment can no longer be assigned", body = ErrorRes)
    )
)]
/// Assign a doctor to an appointment
///
/// Sets the consultation fee from the doctor's profile when none is recorded yet and
/// recomputes the platform commission from the hospital's rate.
#[axum::debug_handler]
pub async fn assign_appointment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<AssignAppointmentReq>,
) -> ApiResult<Json<AppointmentRes>> {
    let id = parse::id("id", &id)?;
    let assigned = AppointmentService::new(state.ctx.clone()).assign(&actor, id, req.try_into()?)?;
    Ok(Json(assigned.into()))
}

#[utoipa::path(
    post,
    path = "/operations/walk-ins",
    request_body = WalkInReq,
    responses(
        (status = 201, description = "Walk-in registered", body = WalkInRes),
        (status = 400, description = "Bad request or queue closed", body = ErrorRes),
        (status = 403, description = "Caller does not manage this hospital", body = ErrorRes)
    )
)]
/// Register a walk-in patient
///
/// With a doctor the appointment is assigned immediately and joins today's queue. Without
/// one it waits in `REVIEWED` and gets a queue number once assigned.
#[axum::debug_handler]
pub async fn register_walk_in(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<WalkInReq>,
) -> ApiResult<(StatusCode, Json<WalkInRes>)> {
    let outcome = QueueService::new(state.ctx.clone()).register_walk_in(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[utoipa::path(
    get,
    path = "/operations/queues/{hospital_id}/{queue_type}",
    params(
        ("hospital_id" = String, Path, description = "Hospital id"),
        ("queue_type" = String, Path, description = "OPD or EMERGENCY")
    ),
    responses(
        (status = 200, description = "Today's queue in number order", body = [QueueEntryRes]),
        (status = 403, description = "Caller does not work at this hospital", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn queue_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((hospital_id, queue_type)): Path<(String, String)>,
) -> ApiResult<Json<Vec<QueueEntryRes>>> {
    let (hospital, queue_type) = queue_path(&hospital_id, &queue_type)?;
    let entries = QueueService::new(state.ctx.clone()).queue_status(&actor, hospital, queue_type)?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/operations/queues/{hospital_id}/{queue_type}/call",
    params(
        ("hospital_id" = String, Path, description = "Hospital id"),
        ("queue_type" = String, Path, description = "OPD or EMERGENCY")
    ),
    responses(
        (status = 200, description = "The patient called", body = QueueEntryRes),
        (status = 403, description = "Caller does not manage this hospital", body = ErrorRes),
        (status = 404, description = "Nobody is waiting", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn call_next(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((hospital_id, queue_type)): Path<(String, String)>,
) -> ApiResult<Json<QueueEntryRes>> {
    let (hospital, queue_type) = queue_path(&hospital_id, &queue_type)?;
    let called = QueueService::new(state.ctx.clone()).call_next(&actor, hospital, queue_type)?;
    Ok(Json(called.into()))
}
