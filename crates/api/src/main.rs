use std::net::SocketAddr;
use std::sync::Arc;

use notice_core::clock::{Clock, SystemClock};
use notice_core::config::Settings;
use notice_core::credentials;
use notice_core::hasher::IdentifierHasher;
use notice_core::salt::SaltManager;
use notice_worker::jobs::alert::AlertContext;
use notice_worker::jobs::notify::NotifyContext;
use notice_worker::push::WebPushGateway;
use notice_worker::telegram::{self, TelegramClient};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

mod error;
mod middleware;
mod routes;
mod state;

use crate::middleware::rate_limit::RateLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = notice_db::connect(&settings.database_url, 10).await?;
    notice_db::migrate(&db).await?;

    let credentials = load_credentials(&settings);
    if settings.admin_token_hash.is_none() {
        warn!(target: "security", "NOTICE_ADMIN_TOKEN_HASH not set, admin endpoints disabled");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let salts = Arc::new(SaltManager::new(clock.clone()));
    let limiter = RateLimiter::new(db.clone(), IdentifierHasher::new(salts), clock.clone());

    let gateway = WebPushGateway::new(settings.push_timeout)?;
    let notifier = NotifyContext {
        db: db.clone(),
        gateway: Arc::new(gateway),
        credentials: credentials.clone(),
        subject: settings.push_subject.clone(),
        delivery_timeout: settings.push_timeout,
        concurrency: settings.push_concurrency,
    };

    let alerts = match settings.telegram.clone() {
        Some(telegram) => Some(Arc::new(AlertContext {
            sender: Arc::new(TelegramClient::new(telegram::SEND_TIMEOUT)?),
            telegram,
        })),
        None => {
            info!("telegram not configured, channel alerts disabled");
            None
        }
    };

    let addr: SocketAddr = settings.api_bind.parse()?;
    let state = AppState {
        db,
        settings: Arc::new(settings),
        limiter: Arc::new(limiter),
        notifier: Arc::new(notifier),
        alerts,
        credentials,
        clock,
    };

    let app = routes::app(state.clone());

    info!(%addr, env = %state.settings.notice_env, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.db.close().await;
    Ok(())
}

/// Push credentials are optional at runtime: without them the API still
/// accepts reports but sends no notifications.
fn load_credentials(settings: &Settings) -> Option<Arc<credentials::PushCredentials>> {
    let loaded = credentials::load_or_generate(&settings.data_dir);
    match loaded.signing_key() {
        Ok(_) => Some(Arc::new(loaded)),
        Err(err) => {
            error!(target: "security", error = %err, "push credentials unusable, notifications disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
