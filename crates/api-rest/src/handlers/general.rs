use crate::error::ApiResult;
use crate::{AppState, CurrentActor};
use api_shared::{ErrorRes, HealthRes, HealthService, NotificationRes};
use axum::{extract::State, response::Json};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    ),
    security(())
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Requires no token.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Notifications addressed to the caller, oldest first", body = [NotificationRes]),
        (status = 401, description = "Missing or unknown token", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn my_notifications(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<NotificationRes>>> {
    let found = state.ctx.notifications().for_recipient(actor.user_id);
    Ok(Json(found.into_iter().map(Into::into).collect()))
}
