//! Request extractors.

use crate::{error::ApiError, AppState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use carelink_core::Actor;

const FORWARDED_FOR: &str = "x-forwarded-for";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
///
/// Rejects with 401 when the token is missing or unknown.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let actor = api_shared::auth::authenticate(
            &state.ctx.identity(),
            header(parts, AUTHORIZATION.as_str()),
            header(parts, FORWARDED_FOR),
        )?;
        Ok(Self(actor))
    }
}
