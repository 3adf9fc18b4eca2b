//! Pharmacy orders and lab requests raised from prescriptions.

use crate::error::ApiResult;
use crate::{AppState, CurrentActor};
use api_shared::{
    parse, CreateLabRequestReq, CreatePharmacyOrderReq, ErrorRes, LabReportRes, LabRequestRes,
    PharmacyOrderRes, UpdateStatusReq, UploadLabReportReq,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use carelink_core::{LabService, PharmacyService};

#[utoipa::path(
    post,
    path = "/pharmacy/orders",
    request_body = CreatePharmacyOrderReq,
    responses(
        (status = 201, description = "Order placed; lines without stock are listed under `skipped`", body = PharmacyOrderRes),
        (status = 400, description = "Pharmacy not accepting orders", body = ErrorRes),
        (status = 403, description = "Not the patient or this pharmacy's admin", body = ErrorRes)
    )
)]
/// Place a pharmacy order for a prescription
///
/// Each line is priced from the first stock row that can supply the full quantity.
#[axum::debug_handler]
pub async fn create_pharmacy_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreatePharmacyOrderReq>,
) -> ApiResult<(StatusCode, Json<PharmacyOrderRes>)> {
    let prescription = parse::id("prescription_id", &req.prescription_id)?;
    let pharmacy = parse::id("pharmacy_id", &req.pharmacy_id)?;
    let outcome =
        PharmacyService::new(state.ctx.clone()).create_order(&actor, prescription, pharmacy)?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[utoipa::path(
    patch,
    path = "/pharmacy/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Order moved; completing it issues the invoice", body = PharmacyOrderRes),
        (status = 403, description = "Caller does not run this pharmacy", body = ErrorRes),
        (status = 409, description = "Transition not allowed or stock short", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn update_pharmacy_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusReq>,
) -> ApiResult<Json<PharmacyOrderRes>> {
    let order = parse::id("id", &id)?;
    let status = parse::wire(&req.status)?;
    let update = PharmacyService::new(state.ctx.clone()).update_order_status(&actor, order, status)?;
    Ok(Json(update.into()))
}

#[utoipa::path(
    post,
    path = "/labs/requests",
    request_body = CreateLabRequestReq,
    responses(
        (status = 201, description = "Request raised", body = LabRequestRes),
        (status = 400, description = "Lab inactive or test not offered", body = ErrorRes),
        (status = 409, description = "Recommendation already completed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn create_lab_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateLabRequestReq>,
) -> ApiResult<(StatusCode, Json<LabRequestRes>)> {
    let recommendation = parse::id("recommendation_id", &req.recommendation_id)?;
    let lab = parse::id("lab_id", &req.lab_id)?;
    let lab_test = parse::optional_id("lab_test_id", req.lab_test_id.as_deref())?;
    let request =
        LabService::new(state.ctx.clone()).create_request(&actor, recommendation, lab, lab_test)?;
    Ok((StatusCode::CREATED, Json(request.into())))
}

#[utoipa::path(
    patch,
    path = "/labs/requests/{id}",
    params(("id" = String, Path, description = "Lab request id")),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Request moved", body = LabRequestRes),
        (status = 403, description = "Caller does not run this lab", body = ErrorRes),
        (status = 409, description = "Transition not allowed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn update_lab_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusReq>,
) -> ApiResult<Json<LabRequestRes>> {
    let request = parse::id("id", &id)?;
    let status = parse::wire(&req.status)?;
    let updated = LabService::new(state.ctx.clone()).update_request_status(&actor, request, status)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/labs/requests/{id}/report",
    params(("id" = String, Path, description = "Lab request id")),
    request_body = UploadLabReportReq,
    responses(
        (status = 201, description = "Report stored; request and recommendation completed", body = LabReportRes),
        (status = 409, description = "Request cancelled or already reported", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn upload_lab_report(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<UploadLabReportReq>,
) -> ApiResult<(StatusCode, Json<LabReportRes>)> {
    let request = parse::id("id", &id)?;
    let report = LabService::new(state.ctx.clone()).upload_report(&actor, request, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(report.into())))
}
