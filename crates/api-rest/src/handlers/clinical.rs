//! Prescriptions and the electronic medical record.

use crate::error::ApiResult;
use crate::{AppState, CurrentActor};
use api_shared::{
    parse, CreateEmrReq, CreatePrescriptionReq, EmrRes, ErrorRes, PrescriptionRes, VitalsReq,
    VitalsRes,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use carelink_core::{EmrService, PrescriptionService};

#[utoipa::path(
    get,
    path = "/prescriptions",
    responses(
        (status = 200, description = "Prescriptions visible to the caller, newest first", body = [PrescriptionRes])
    )
)]
#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    let found = PrescriptionService::new(state.ctx.clone()).list(&actor)?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/prescriptions",
    request_body = CreatePrescriptionReq,
    responses(
        (status = 201, description = "Prescription written; the appointment is completed", body = PrescriptionRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 403, description = "Caller is not the assigned doctor", body = ErrorRes),
        (status = 409, description = "Appointment cannot take a prescription", body = ErrorRes)
    )
)]
/// Write the prescription for an appointment
///
/// Only the assigned doctor may prescribe, once per appointment. Writing it completes the
/// appointment and notifies the patient.
#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreatePrescriptionReq>,
) -> ApiResult<(StatusCode, Json<PrescriptionRes>)> {
    let detail = PrescriptionService::new(state.ctx.clone()).create(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

#[utoipa::path(
    get,
    path = "/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    responses(
        (status = 200, description = "The prescription with its lines", body = PrescriptionRes),
        (status = 403, description = "Outside the caller's scope", body = ErrorRes),
        (status = 404, description = "No such prescription", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<PrescriptionRes>> {
    let id = parse::id("id", &id)?;
    let detail = PrescriptionService::new(state.ctx.clone()).get(&actor, id)?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    post,
    path = "/emr",
    request_body = CreateEmrReq,
    responses(
        (status = 201, description = "Visit recorded", body = EmrRes),
        (status = 403, description = "Caller is not the assigned doctor", body = ErrorRes),
        (status = 409, description = "Visit not started or already recorded", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn record_visit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateEmrReq>,
) -> ApiResult<(StatusCode, Json<EmrRes>)> {
    let record = EmrService::new(state.ctx.clone()).record_visit(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    post,
    path = "/emr/{id}/vitals",
    params(("id" = String, Path, description = "EMR record id")),
    request_body = VitalsReq,
    responses(
        (status = 201, description = "Vitals recorded", body = VitalsRes),
        (status = 400, description = "Reading out of range", body = ErrorRes),
        (status = 403, description = "Caller may not record vitals", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn add_vitals(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<VitalsReq>,
) -> ApiResult<(StatusCode, Json<VitalsRes>)> {
    let emr = parse::id("id", &id)?;
    let vitals = EmrService::new(state.ctx.clone()).add_vitals(&actor, emr, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(vitals.into())))
}

#[utoipa::path(
    get,
    path = "/emr/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient profile id")),
    responses(
        (status = 200, description = "The patient's visits the caller may see, newest first", body = [EmrRes]),
        (status = 404, description = "No such patient", body = ErrorRes)
    )
)]
/// Longitudinal medical history of a patient
///
/// The record follows the patient across hospitals. Hospital administrators and directors
/// only see visits at their own hospitals. Every read is audited.
#[axum::debug_handler]
pub async fn patient_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<EmrRes>>> {
    let patient = parse::id("patient_id", &patient_id)?;
    let history = EmrService::new(state.ctx.clone()).patient_history(&actor, patient)?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}
