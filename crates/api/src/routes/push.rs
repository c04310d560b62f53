use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/vapid-public-key", get(public_key))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct PublicKeyResponse {
    key: String,
}

async fn public_key(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<PublicKeyResponse>> {
    let credentials = state.credentials.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("push notifications are not configured".to_string())
            .with_request_id(&request_id.0)
    })?;

    Ok(Json(PublicKeyResponse {
        key: credentials.public_key.clone(),
    }))
}
