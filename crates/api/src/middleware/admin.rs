use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use notice_core::auth::verify_token;
use tracing::warn;

use crate::{
    error::{ApiError, AppError},
    state::{AppState, RequestId},
};

/// Gate for superuser routes. The bearer token's SHA-256 must match the
/// configured hash; with no hash configured every request is refused.
pub async fn superuser_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    authorize(
        state.settings.admin_token_hash.as_deref(),
        req.headers().get(header::AUTHORIZATION),
    )
    .map_err(|err| err.with_request_id(&request_id))?;

    Ok(next.run(req).await)
}

fn authorize(expected_hash: Option<&str>, header: Option<&HeaderValue>) -> Result<(), AppError> {
    let Some(expected_hash) = expected_hash else {
        warn!(target: "security", "admin request refused, no admin token configured");
        return Err(AppError::Unauthorized);
    };
    let token = header.and_then(parse_bearer).ok_or(AppError::Unauthorized)?;
    if !verify_token(token, expected_hash) {
        warn!(target: "security", "admin request with invalid token");
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn parse_bearer(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
