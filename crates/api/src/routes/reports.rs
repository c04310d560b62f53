use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use notice_core::geohash;
use notice_core::types::NewReport;
use notice_db::models::Report;
use notice_worker::jobs::{alert, notify};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    error::{ApiResult, AppError},
    middleware::{client_ip::ClientIdentifier, rate_limit::Admission},
    state::{AppState, RequestId},
};

/// Reports older than this are never listed, even before the purge runs.
const REPORT_LIFETIME_HOURS: i64 = 24;
const LIST_LIMIT: i64 = 200;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/reports", get(list_reports).post(create_report))
        .route("/api/reports/{id}/confirm", post(confirm_report))
        .route("/api/reports/{id}/dispute", post(dispute_report))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    geohash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    id: String,
    geohash: String,
    #[serde(rename = "type")]
    kind: String,
    description: Option<String>,
    lat: f64,
    long: f64,
    confirmations: i64,
    disputes: i64,
    created_at: DateTime<Utc>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            id: report.id,
            geohash: report.geohash,
            kind: report.kind,
            description: report.description,
            lat: report.lat,
            long: report.long,
            confirmations: report.confirmations,
            disputes: report.disputes,
            created_at: notice_db::from_millis(report.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    items: Vec<ReportResponse>,
}

async fn list_reports(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ReportListResponse>> {
    let prefix = query.geohash.as_deref().filter(|g| !g.is_empty());
    if let Some(prefix) = prefix {
        if !geohash::is_valid_len(prefix, 1) {
            return Err(AppError::BadRequest("invalid geohash prefix".to_string())
                .with_request_id(&request_id.0));
        }
    }

    let since = state.clock.now() - Duration::hours(REPORT_LIFETIME_HOURS);
    let reports =
        notice_db::queries::reports::list_recent(&state.db, prefix, notice_db::to_millis(since), LIST_LIMIT)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to list reports");
                AppError::Internal.with_request_id(&request_id.0)
            })?;

    Ok(Json(ReportListResponse {
        items: reports.into_iter().map(ReportResponse::from).collect(),
    }))
}

/// Validate, rate limit, store, then notify nearby subscribers and the
/// alert channel in the background. Invalid submissions are rejected before they count against
/// the source's quota.
async fn create_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    client: ClientIdentifier,
    payload: Result<Json<NewReport>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReportResponse>)> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::BadRequest(rejection.body_text()).with_request_id(&request_id.0)
    })?;

    let kind = payload
        .validate()
        .map_err(|err| AppError::BadRequest(err.to_string()).with_request_id(&request_id.0))?;

    if let Admission::Deny { retry_after } = state.limiter.admit(&client.0).await {
        return Err(AppError::RateLimited {
            retry_after_secs: retry_after.num_seconds().max(1) as u64,
        }
        .with_request_id(&request_id.0));
    }

    let now = notice_db::to_millis(state.clock.now());
    let report =
        notice_db::queries::reports::create(&state.db, &notice_db::new_id(), kind, &payload, now)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to store report");
                AppError::Internal.with_request_id(&request_id.0)
            })?;

    info!(report_id = %report.id, kind = %kind, "report created");
    drop(notify::spawn(state.notifier.clone(), report.clone()));
    if let Some(alerts) = &state.alerts {
        drop(alert::spawn(alerts.clone(), report.clone()));
    }

    Ok((StatusCode::CREATED, Json(report.into())))
}

async fn confirm_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    let now = notice_db::to_millis(state.clock.now());
    let report = notice_db::queries::reports::add_confirmation(&state.db, &id, now)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to confirm report");
            AppError::Internal.with_request_id(&request_id.0)
        })?
        .ok_or_else(|| {
            AppError::NotFound("report not found".to_string()).with_request_id(&request_id.0)
        })?;

    Ok(Json(report.into()))
}

async fn dispute_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    let now = notice_db::to_millis(state.clock.now());
    let report = notice_db::queries::reports::add_dispute(&state.db, &id, now)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to dispute report");
            AppError::Internal.with_request_id(&request_id.0)
        })?
        .ok_or_else(|| {
            AppError::NotFound("report not found".to_string()).with_request_id(&request_id.0)
        })?;

    Ok(Json(report.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{eventually, request_id, test_app, test_app_with_delivery};
    use notice_core::types::{NewSubscription, SubscriptionKeys};

    fn body(geohash: &str, kind: &str) -> Result<Json<NewReport>, JsonRejection> {
        Ok(Json(NewReport {
            geohash: geohash.to_string(),
            kind: kind.to_string(),
            description: Some("Black ice".to_string()),
            lat: 37.7749,
            long: -122.4194,
        }))
    }

    fn client(ip: &str) -> ClientIdentifier {
        ClientIdentifier(ip.to_string())
    }

    async fn create(
        state: &AppState,
        ip: &str,
        geohash: &str,
    ) -> ApiResult<(StatusCode, Json<ReportResponse>)> {
        create_report(
            State(state.clone()),
            request_id(),
            client(ip),
            body(geohash, "danger"),
        )
        .await
    }

    async fn list(state: &AppState, geohash: Option<&str>) -> ApiResult<Json<ReportListResponse>> {
        list_reports(
            State(state.clone()),
            request_id(),
            Query(ListQuery {
                geohash: geohash.map(str::to_string),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn test_create_report() {
        let app = test_app().await;

        let (status, Json(report)) = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(report.kind, "danger");
        assert_eq!(report.id.len(), notice_db::ID_LEN);
        assert_eq!(report.created_at, app.state.clock.now());
    }

    #[tokio::test]
    async fn test_rate_limit_end_to_end() {
        let app = test_app().await;

        let _ = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();

        let err = create(&app.state, "203.0.113.7", "9q8yyk13").await.unwrap_err();
        assert!(matches!(
            err.error,
            AppError::RateLimited {
                retry_after_secs: 3600
            }
        ));

        app.clock.advance(Duration::minutes(61));
        let _ = create(&app.state, "203.0.113.7", "9q8yyk14").await.unwrap();

        let stored = list(&app.state, None).await.unwrap().0.items;
        assert_eq!(stored.len(), 2, "the denied submission is not stored");
    }

    #[tokio::test]
    async fn test_invalid_report_does_not_consume_quota() {
        let app = test_app().await;

        let err = create_report(
            State(app.state.clone()),
            request_id(),
            client("203.0.113.7"),
            body("9q8yyk12", "fire"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.error, AppError::BadRequest(_)));

        let _ = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_prefix() {
        let app = test_app().await;
        let _ = create(&app.state, "203.0.113.1", "9q8yyk12").await.unwrap();
        let _ = create(&app.state, "203.0.113.2", "9q8zzz").await.unwrap();

        let nearby = list(&app.state, Some("9q8y")).await.unwrap().0.items;
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].geohash, "9q8yyk12");

        let err = list(&app.state, Some("9q8y%")).await.unwrap_err();
        assert!(matches!(err.error, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_list_hides_reports_older_than_a_day() {
        let app = test_app().await;
        let _ = create(&app.state, "203.0.113.1", "9q8yyk12").await.unwrap();

        app.clock.advance(Duration::hours(25));
        assert!(list(&app.state, None).await.unwrap().0.items.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_and_dispute() {
        let app = test_app().await;
        let (_, Json(report)) = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();

        let Json(confirmed) = confirm_report(
            State(app.state.clone()),
            request_id(),
            Path(report.id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(confirmed.confirmations, 1);

        let Json(disputed) = dispute_report(
            State(app.state.clone()),
            request_id(),
            Path(report.id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(disputed.disputes, 1);

        let err = confirm_report(State(app.state), request_id(), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::NotFound(_)));
    }

    async fn subscribe(state: &AppState, endpoint: &str, geohash: &str) {
        let sub = NewSubscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "BEl62iUYgUivxIkv69yViEuiBIa".to_string(),
                auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
            },
            geohash: geohash.to_string(),
        };
        notice_db::queries::push_subscriptions::upsert(&state.db, &notice_db::new_id(), &sub, 1_000)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_created_report_notifies_nearby_subscribers() {
        let app = test_app_with_delivery().await;
        subscribe(&app.state, "https://push.test/near", "9q8yab").await;
        subscribe(&app.state, "https://push.test/far", "9q8zzz").await;

        let (_, Json(report)) = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();

        eventually(|| !app.gateway.endpoints().is_empty() && !app.chat.messages().is_empty()).await;
        assert_eq!(app.gateway.endpoints(), ["https://push.test/near"]);

        let messages = app.chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].chat_id, "-100200");
        assert!(messages[0].text.starts_with("🚨 *DANGER*"));
        assert!(messages[0].text.contains(&format!("`{}`", report.geohash)));
    }

    #[tokio::test]
    async fn test_rejected_submissions_notify_nobody() {
        let app = test_app_with_delivery().await;
        subscribe(&app.state, "https://push.test/near", "9q8yab").await;

        let _ = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();
        eventually(|| app.gateway.endpoints().len() == 1 && app.chat.messages().len() == 1).await;

        let err = create(&app.state, "203.0.113.7", "9q8yyk13").await.unwrap_err();
        assert!(matches!(err.error, AppError::RateLimited { .. }));
        let err = create_report(
            State(app.state.clone()),
            request_id(),
            client("203.0.113.8"),
            body("9q8yyk12", "fire"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.error, AppError::BadRequest(_)));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(app.gateway.endpoints().len(), 1);
        assert_eq!(app.chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_sent_without_push_credentials_or_channel() {
        let app = test_app().await;
        subscribe(&app.state, "https://push.test/near", "9q8yab").await;

        let _ = create(&app.state, "203.0.113.7", "9q8yyk12").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(app.gateway.endpoints().is_empty());
        assert!(app.chat.messages().is_empty());
    }
}
