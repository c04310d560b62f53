use axum::{extract::State, routing::delete, Extension, Json, Router};
use serde::Serialize;
use tracing::{error, warn};

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/torch", delete(torch))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct TorchResponse {
    success: bool,
    deleted: u64,
}

/// Delete every report immediately. Hashes and subscriptions are left to
/// their own expiry.
async fn torch(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<TorchResponse>> {
    let deleted = notice_db::queries::reports::delete_all(&state.db)
        .await
        .map_err(|err| {
            error!(error = %err, "torch failed");
            AppError::Internal.with_request_id(&request_id.0)
        })?;

    warn!(target: "security", deleted, "admin torch deleted all reports");
    Ok(Json(TorchResponse {
        success: true,
        deleted,
    }))
}
