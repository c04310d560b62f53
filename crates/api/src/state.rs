use std::sync::Arc;

use notice_core::clock::Clock;
use notice_core::config::Settings;
use notice_core::credentials::PushCredentials;
use notice_worker::jobs::alert::AlertContext;
use notice_worker::jobs::notify::NotifyContext;
use sqlx::SqlitePool;

use crate::middleware::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub limiter: Arc<RateLimiter>,
    pub notifier: Arc<NotifyContext>,
    pub alerts: Option<Arc<AlertContext>>,
    pub credentials: Option<Arc<PushCredentials>>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);
