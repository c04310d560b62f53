//! Daily rotating salt, held only in memory.
//!
//! The salt is never written anywhere. A process restart or a UTC day
//! boundary produces a fresh value, so hashes stored under an older salt can
//! no longer be linked to new submissions from the same source.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::clock::Clock;

pub const SALT_LEN: usize = 32;
const SECONDS_PER_DAY: i64 = 86_400;

pub type Salt = [u8; SALT_LEN];

/// Fills a buffer with cryptographically secure random bytes.
pub type EntropySource = fn(&mut [u8]) -> Result<(), rand::Error>;

fn os_entropy(buf: &mut [u8]) -> Result<(), rand::Error> {
    OsRng.try_fill_bytes(buf)
}

/// Days since the unix epoch, in UTC.
pub fn day_epoch(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(SECONDS_PER_DAY)
}

#[derive(Clone, Copy)]
struct CurrentSalt {
    value: Salt,
    day_epoch: i64,
}

pub struct SaltManager {
    clock: Arc<dyn Clock>,
    entropy: EntropySource,
    current: RwLock<Option<CurrentSalt>>,
}

impl SaltManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_entropy(clock, os_entropy)
    }

    pub fn with_entropy(clock: Arc<dyn Clock>, entropy: EntropySource) -> Self {
        Self {
            clock,
            entropy,
            current: RwLock::new(None),
        }
    }

    /// The salt for the current UTC day, generated on first use that day.
    pub fn current_salt(&self) -> Salt {
        let now = self.clock.now();
        let today = day_epoch(now);

        {
            let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(salt) = current.as_ref().filter(|s| s.day_epoch == today) {
                return salt.value;
            }
        }

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have rotated while we waited for the lock.
        if let Some(salt) = current.as_ref().filter(|s| s.day_epoch == today) {
            return salt.value;
        }

        let value = self.generate(now);
        *current = Some(CurrentSalt {
            value,
            day_epoch: today,
        });
        info!(target: "security", day_epoch = today, "rotated rate-limit salt");
        value
    }

    fn generate(&self, now: DateTime<Utc>) -> Salt {
        let mut salt = [0u8; SALT_LEN];
        match (self.entropy)(&mut salt) {
            Ok(()) => salt,
            Err(err) => {
                warn!(
                    target: "security",
                    error = %err,
                    "secure random source failed, using clock-derived salt"
                );
                fallback_salt(now)
            }
        }
    }
}

fn fallback_salt(now: DateTime<Utc>) -> Salt {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seed = format!("fallback-{}-{}", now.timestamp(), nanos);
    let digest = Sha256::digest(seed.as_bytes());
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&digest);
    salt
}
