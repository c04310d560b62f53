use chrono::Duration;
use notice_core::clock::Clock;
use notice_db::queries::{maintenance, push_subscriptions, rate_limit_hashes, reports};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PurgePolicy {
    pub report_ttl: Duration,
    pub hash_ttl: Duration,
    pub subscription_ttl: Duration,
    /// Most rows deleted per table in one run.
    pub batch_size: i64,
}

impl Default for PurgePolicy {
    fn default() -> Self {
        Self {
            report_ttl: Duration::hours(24),
            hash_ttl: Duration::hours(2),
            subscription_ttl: Duration::days(7),
            batch_size: 1000,
        }
    }
}

impl PurgePolicy {
    pub fn with_batch_size(batch_size: i64) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub reports: u64,
    pub hashes: u64,
    pub subscriptions: u64,
    pub compacted: bool,
    pub checkpointed: bool,
}

/// Delete expired rows, then compact the file and truncate the WAL so the
/// deleted data is not recoverable from disk. Each step runs even if an
/// earlier one failed.
pub async fn run_purge(db: &SqlitePool, clock: &dyn Clock, policy: &PurgePolicy) -> PurgeSummary {
    let now = clock.now();
    let cutoff = |ttl: Duration| notice_db::to_millis(now - ttl);
    let mut summary = PurgeSummary::default();

    match reports::delete_created_before(db, cutoff(policy.report_ttl), policy.batch_size).await {
        Ok(count) => summary.reports = count,
        Err(err) => error!(error = %err, "failed to purge expired reports"),
    }

    match rate_limit_hashes::delete_created_before(db, cutoff(policy.hash_ttl), policy.batch_size)
        .await
    {
        Ok(count) => summary.hashes = count,
        Err(err) => error!(error = %err, "failed to purge expired rate-limit hashes"),
    }

    match push_subscriptions::delete_updated_before(
        db,
        cutoff(policy.subscription_ttl),
        policy.batch_size,
    )
    .await
    {
        Ok(count) => summary.subscriptions = count,
        Err(err) => error!(error = %err, "failed to purge stale push subscriptions"),
    }

    match maintenance::vacuum(db).await {
        Ok(()) => summary.compacted = true,
        Err(err) => error!(error = %err, "vacuum failed"),
    }

    match maintenance::checkpoint_wal(db).await {
        Ok(checkpoint) if checkpoint.busy => {
            warn!(
                log_frames = checkpoint.log_frames,
                checkpointed_frames = checkpoint.checkpointed_frames,
                "wal checkpoint could not complete, readers busy"
            );
        }
        Ok(_) => summary.checkpointed = true,
        Err(err) => error!(error = %err, "wal checkpoint failed"),
    }

    info!(
        reports = summary.reports,
        hashes = summary.hashes,
        subscriptions = summary.subscriptions,
        compacted = summary.compacted,
        checkpointed = summary.checkpointed,
        "purge finished"
    );
    summary
}
