use std::sync::Arc;

use chrono::Duration;
use notice_core::clock::Clock;
use notice_core::hasher::IdentifierHasher;
use notice_db::queries::rate_limit_hashes;
use notice_db::{from_millis, new_id, to_millis};
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// One report per source per window.
pub const WINDOW_MINUTES: i64 = 60;

fn window() -> Duration {
    Duration::minutes(WINDOW_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny { retry_after: Duration },
}

/// Sliding-window limiter keyed by the salted hash of the client identifier.
///
/// The lookup and the insert are separate statements, so two simultaneous
/// first submissions from one source may both be admitted.
pub struct RateLimiter {
    db: SqlitePool,
    hasher: IdentifierHasher,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(db: SqlitePool, hasher: IdentifierHasher, clock: Arc<dyn Clock>) -> Self {
        Self { db, hasher, clock }
    }

    pub async fn admit(&self, identifier: &str) -> Admission {
        let hash = self.hasher.hash(identifier);
        let now = self.clock.now();

        match rate_limit_hashes::find_recent(&self.db, &hash, to_millis(now - window())).await {
            Ok(Some(previous)) => {
                let elapsed = now - from_millis(previous.created_at);
                let retry_after = (window() - elapsed).max(Duration::seconds(1));
                debug!(retry_after_secs = retry_after.num_seconds(), "submission rate limited");
                return Admission::Deny { retry_after };
            }
            Ok(None) => {}
            // Availability wins over strictness when storage misbehaves.
            Err(err) => warn!(error = %err, "rate-limit lookup failed, admitting request"),
        }

        if let Err(err) = rate_limit_hashes::create(&self.db, &new_id(), &hash, to_millis(now)).await
        {
            warn!(error = %err, "failed to record rate-limit hash");
        }
        Admission::Allow
    }
}
