pub mod admin;
pub mod config;
pub mod health;
pub mod push;
pub mod reports;
pub mod subscriptions;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::middleware::{admin::superuser_auth, request_id::request_id};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let admin = admin::router(state.clone()).layer(from_fn_with_state(state.clone(), superuser_auth));

    Router::new()
        .merge(health::router(state.clone()))
        .merge(config::router(state.clone()))
        .merge(push::router(state.clone()))
        .merge(reports::router(state.clone()))
        .merge(subscriptions::router(state))
        .merge(admin)
        .layer(from_fn(request_id))
}
