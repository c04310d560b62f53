use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use notice_core::types::NewSubscription;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/push-subscriptions",
            post(subscribe).delete(unsubscribe),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    success: bool,
    removed: bool,
}

/// Register a browser for alerts near `geohash`. Re-subscribing the same
/// endpoint replaces its keys and location and restarts its 7-day lifetime.
async fn subscribe(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<NewSubscription>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::BadRequest(rejection.body_text()).with_request_id(&request_id.0)
    })?;
    payload
        .validate()
        .map_err(|err| AppError::BadRequest(err.to_string()).with_request_id(&request_id.0))?;

    let now = notice_db::to_millis(state.clock.now());
    notice_db::queries::push_subscriptions::upsert(&state.db, &notice_db::new_id(), &payload, now)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to store push subscription");
            AppError::Internal.with_request_id(&request_id.0)
        })?;

    debug!("push subscription stored");
    Ok((StatusCode::CREATED, Json(SubscriptionResponse { success: true })))
}

async fn unsubscribe(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> ApiResult<Json<UnsubscribeResponse>> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::BadRequest(rejection.body_text()).with_request_id(&request_id.0)
    })?;
    if payload.endpoint.trim().is_empty() {
        return Err(AppError::BadRequest("endpoint is required".to_string())
            .with_request_id(&request_id.0));
    }

    let removed =
        notice_db::queries::push_subscriptions::delete_by_endpoint(&state.db, &payload.endpoint)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to remove push subscription");
                AppError::Internal.with_request_id(&request_id.0)
            })?;

    Ok(Json(UnsubscribeResponse {
        success: true,
        removed: removed > 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{request_id, test_app};
    use notice_core::types::SubscriptionKeys;

    fn subscription(endpoint: &str) -> NewSubscription {
        NewSubscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "BEl62iUYgUivxIkv69yViEuiBIa".to_string(),
                auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
            },
            geohash: "9q8yabcd".to_string(),
        }
    }

    async fn count(state: &AppState) -> usize {
        notice_db::queries::push_subscriptions::list_by_geohash_prefix(&state.db, "", 100)
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_subscribe_is_upsert() {
        let app = test_app().await;
        let endpoint = "https://push.example.net/send/abc";

        for _ in 0..2 {
            let (status, Json(body)) = subscribe(
                State(app.state.clone()),
                request_id(),
                Ok(Json(subscription(endpoint))),
            )
            .await
            .unwrap();
            assert_eq!(status, StatusCode::CREATED);
            assert!(body.success);
        }

        assert_eq!(count(&app.state).await, 1);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid() {
        let app = test_app().await;
        let err = subscribe(
            State(app.state.clone()),
            request_id(),
            Ok(Json(subscription("http://insecure.test/a"))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.error, AppError::BadRequest(_)));
        assert_eq!(count(&app.state).await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let app = test_app().await;
        let endpoint = "https://push.example.net/send/abc";
        subscribe(State(app.state.clone()), request_id(), Ok(Json(subscription(endpoint))))
            .await
            .unwrap();

        let unsubscribe_once = || {
            unsubscribe(
                State(app.state.clone()),
                request_id(),
                Ok(Json(UnsubscribeRequest {
                    endpoint: endpoint.to_string(),
                })),
            )
        };
        assert!(unsubscribe_once().await.unwrap().0.removed);
        assert!(!unsubscribe_once().await.unwrap().0.removed);
        assert_eq!(count(&app.state).await, 0);
    }
}
