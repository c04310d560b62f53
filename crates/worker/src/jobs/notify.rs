use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use notice_core::credentials::PushCredentials;
use notice_core::geohash;
use notice_core::types::{valid_latitude, valid_longitude, NotificationPayload, ReportType};
use notice_db::models::{PushSubscription, Report};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::push::{PushGateway, PushOptions, PushTarget};

/// Most subscriptions notified for a single report.
pub const FANOUT_LIMIT: i64 = 100;
/// How long the push service may hold an undelivered message.
pub const PUSH_TTL_SECS: u32 = 3600;
const ENDPOINT_LOG_CHARS: usize = 40;

#[derive(Clone)]
pub struct NotifyContext {
    pub db: SqlitePool,
    pub gateway: Arc<dyn PushGateway>,
    pub credentials: Option<Arc<PushCredentials>>,
    pub subject: String,
    pub delivery_timeout: Duration,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub found: usize,
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: usize,
}

enum Outcome {
    Delivered,
    Gone { pruned: bool },
    Failed,
}

/// Run [`dispatch`] on its own task. Callers normally drop the handle.
pub fn spawn(ctx: Arc<NotifyContext>, report: Report) -> JoinHandle<DispatchSummary> {
    tokio::spawn(async move { dispatch(&ctx, &report).await })
}

/// Push a notification for `report` to every subscription in the same
/// 4-character geohash cell. Failures are logged, never returned.
pub async fn dispatch(ctx: &NotifyContext, report: &Report) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    if report.kind.parse::<ReportType>().is_err()
        || !valid_latitude(report.lat)
        || !valid_longitude(report.long)
    {
        warn!(report_id = %report.id, "report failed validation, skipping notifications");
        return summary;
    }
    let Some(prefix) = geohash::proximity_prefix(&report.geohash) else {
        warn!(report_id = %report.id, "report geohash too short for proximity match");
        return summary;
    };

    let Some(credentials) = ctx.credentials.as_deref() else {
        warn!(target: "security", "push credentials unavailable, notifications disabled");
        return summary;
    };

    let payload = NotificationPayload::for_report(
        &report.id,
        &report.kind,
        report.description.as_deref(),
        report.lat,
        report.long,
    );
    let payload = match serde_json::to_vec(&payload) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, report_id = %report.id, "failed to encode notification payload");
            return summary;
        }
    };

    let subscriptions =
        match notice_db::queries::push_subscriptions::list_by_geohash_prefix(&ctx.db, prefix, FANOUT_LIMIT)
            .await
        {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                error!(error = %err, report_id = %report.id, "failed to load nearby subscriptions");
                return summary;
            }
        };
    summary.found = subscriptions.len();

    let deliverable: Vec<PushSubscription> = subscriptions
        .into_iter()
        .filter(|sub| {
            !sub.endpoint.is_empty() && !sub.keys_p256dh.is_empty() && !sub.keys_auth.is_empty()
        })
        .collect();
    summary.attempted = deliverable.len();

    let options = PushOptions {
        credentials,
        subject: &ctx.subject,
        ttl_secs: PUSH_TTL_SECS,
    };

    let outcomes: Vec<Outcome> = stream::iter(deliverable)
        .map(|sub| deliver(ctx, &payload, &options, sub))
        .buffer_unordered(ctx.concurrency.max(1))
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            Outcome::Delivered => summary.delivered += 1,
            Outcome::Gone { pruned: true } => summary.pruned += 1,
            Outcome::Gone { pruned: false } | Outcome::Failed => {}
        }
    }

    info!(
        report_id = %report.id,
        found = summary.found,
        attempted = summary.attempted,
        delivered = summary.delivered,
        pruned = summary.pruned,
        "notification dispatch finished"
    );
    summary
}

async fn deliver(
    ctx: &NotifyContext,
    payload: &[u8],
    options: &PushOptions<'_>,
    sub: PushSubscription,
) -> Outcome {
    let target = PushTarget {
        endpoint: &sub.endpoint,
        p256dh: &sub.keys_p256dh,
        auth: &sub.keys_auth,
    };
    let endpoint = short_endpoint(&sub.endpoint);

    let result = tokio::time::timeout(
        ctx.delivery_timeout,
        ctx.gateway.send(payload, &target, options),
    )
    .await;

    match result {
        Ok(Ok(response)) if response.is_success() => {
            debug!(endpoint, status = response.status, "push delivered");
            Outcome::Delivered
        }
        Ok(Ok(response)) if response.is_gone() => {
            match notice_db::queries::push_subscriptions::delete_by_id(&ctx.db, &sub.id).await {
                Ok(_) => {
                    info!(endpoint, status = response.status, "removed expired push subscription");
                    Outcome::Gone { pruned: true }
                }
                Err(err) => {
                    error!(error = %err, endpoint, "failed to remove expired push subscription");
                    Outcome::Gone { pruned: false }
                }
            }
        }
        Ok(Ok(response)) => {
            warn!(endpoint, status = response.status, "push service rejected notification");
            Outcome::Failed
        }
        Ok(Err(err)) => {
            warn!(error = %err, endpoint, "push delivery failed");
            Outcome::Failed
        }
        Err(_) => {
            warn!(endpoint, timeout_ms = ctx.delivery_timeout.as_millis() as u64, "push delivery timed out");
            Outcome::Failed
        }
    }
}

fn short_endpoint(endpoint: &str) -> &str {
    match endpoint.char_indices().nth(ENDPOINT_LOG_CHARS) {
        Some((idx, _)) => &endpoint[..idx],
        None => endpoint,
    }
}
