use anyhow::Result;
use clap::Parser;
use notice_core::clock::SystemClock;
use notice_core::config::Settings;
use notice_worker::jobs::purge::{run_purge, PurgePolicy};
use tokio::time::MissedTickBehavior;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "notice-worker", about = "Scheduled purge of expired notICE data")]
struct Args {
    /// Run a single purge and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let db = notice_db::connect(&settings.database_url, 2).await?;
    notice_db::migrate(&db).await?;

    let clock = SystemClock;
    let policy = PurgePolicy::with_batch_size(settings.purge_batch);

    if args.once {
        run_purge(&db, &clock, &policy).await;
        return Ok(());
    }

    info!(
        interval_secs = settings.purge_interval.as_secs(),
        batch = settings.purge_batch,
        "purge worker starting"
    );

    let mut ticker = tokio::time::interval(settings.purge_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_purge(&db, &clock, &policy).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    db.close().await;
    Ok(())
}
