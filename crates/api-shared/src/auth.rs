//! Bearer-token authentication shared by the API front ends.

use carelink_core::{Actor, CareError, CareResult, IdentityService};

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for a missing header, another
/// scheme, or an empty token.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The originating client address from an `x-forwarded-for` header value (its first hop).
pub fn client_origin(forwarded_for: Option<&str>) -> Option<String> {
    forwarded_for?
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(str::to_owned)
}

/// Resolves the calling user from raw header values.
///
/// # Errors
///
/// Returns [`CareError::Unauthenticated`] when the header is missing or malformed, or the
/// token does not belong to an active user.
pub fn authenticate(
    identity: &IdentityService,
    authorization: Option<&str>,
    forwarded_for: Option<&str>,
) -> CareResult<Actor> {
    let token = bearer_token(authorization).ok_or_else(|| {
        tracing::debug!("request without a bearer token");
        CareError::Unauthenticated
    })?;
    identity.authenticate(token, client_origin(forwarded_for))
}
