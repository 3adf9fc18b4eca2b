//! Mapping of core failures onto HTTP responses.

use api_shared::ErrorRes;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use carelink_core::CareError;

/// A core error on its way out of a handler.
///
/// The body is always `{"error": "<message>"}`. Infrastructure failures are logged and their
/// detail withheld from the client.
#[derive(Debug)]
pub struct ApiError(pub CareError);

impl From<CareError> for ApiError {
    fn from(err: CareError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CareError::Validation(_) | CareError::InvalidId(_) | CareError::InvalidValue(_) => {
                StatusCode::BAD_REQUEST
            }
            CareError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CareError::Permission(_) => StatusCode::FORBIDDEN,
            CareError::NotFound { .. } => StatusCode::NOT_FOUND,
            CareError::StateConflict(_) => StatusCode::CONFLICT,
            CareError::Persistence(_)
            | CareError::Serialization(_)
            | CareError::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:?}", self.0);
            "Internal error".to_string()
        } else {
            if status == StatusCode::FORBIDDEN {
                tracing::warn!("{}", self.0);
            }
            self.0.to_string()
        };
        (status, Json(ErrorRes { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_errors_map_to_client_statuses() {
        let cases = [
            (CareError::validation("bad date"), StatusCode::BAD_REQUEST),
            (CareError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CareError::permission("not yours"), StatusCode::FORBIDDEN),
            (CareError::not_found("appointment", "x"), StatusCode::NOT_FOUND),
            (CareError::conflict("already billed"), StatusCode::CONFLICT),
            (CareError::StoreUnavailable, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
