use crate::error::ApiResult;
use crate::{AppState, CurrentActor};
use api_shared::{parse, CreatePaymentReq, ErrorRes, PaymentInvoiceRes, PaymentRes};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use carelink_core::PaymentService;

#[utoipa::path(
    post,
    path = "/payments",
    request_body = CreatePaymentReq,
    responses(
        (status = 201, description = "Payment initiated", body = PaymentRes),
        (status = 400, description = "Bad request or zero amount", body = ErrorRes),
        (status = 409, description = "Nothing to pay yet, or already being paid", body = ErrorRes)
    )
)]
/// Initiate a payment
///
/// The amount defaults to the linked record's price. Consultation payments carry the
/// hospital's commission split.
#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreatePaymentReq>,
) -> ApiResult<(StatusCode, Json<PaymentRes>)> {
    let payment = PaymentService::new(state.ctx.clone()).create_payment(&actor, req.try_into()?)?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

#[utoipa::path(
    post,
    path = "/payments/{id}/process",
    params(("id" = String, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment completed", body = PaymentRes),
        (status = 409, description = "Payment not pending", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn process_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<PaymentRes>> {
    let id = parse::id("id", &id)?;
    let payment = PaymentService::new(state.ctx.clone()).process_payment(&actor, id)?;
    Ok(Json(payment.into()))
}

#[utoipa::path(
    post,
    path = "/payments/{id}/invoice",
    params(("id" = String, Path, description = "Payment id")),
    responses(
        (status = 201, description = "Invoice issued", body = PaymentInvoiceRes),
        (status = 409, description = "Payment incomplete or already invoiced", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn issue_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<PaymentInvoiceRes>)> {
    let id = parse::id("id", &id)?;
    let invoice = PaymentService::new(state.ctx.clone()).issue_invoice(&actor, id)?;
    Ok((StatusCode::CREATED, Json(invoice.into())))
}
