use axum::{extract::State, routing::get, Json, Router};
use notice_core::config::RegionSettings;
use serde::Serialize;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(public_config))
        .with_state(state)
}

/// Public, unauthenticated settings the frontend needs before its first
/// request.
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    region: RegionResponse,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RegionResponse {
    name: String,
    lat: f64,
    long: f64,
    zoom: u8,
}

impl From<&RegionSettings> for RegionResponse {
    fn from(region: &RegionSettings) -> Self {
        Self {
            name: region.name.clone(),
            lat: region.lat,
            long: region.long,
            zoom: region.zoom,
        }
    }
}

async fn public_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        region: RegionResponse::from(&state.settings.region),
    })
}
