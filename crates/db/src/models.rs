use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Timestamps are unix milliseconds (UTC).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Report {
    pub id: String,
    pub geohash: String,
    pub kind: String,
    pub description: Option<String>,
    pub lat: f64,
    pub long: f64,
    pub confirmations: i64,
    pub disputes: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct RateLimitHash {
    pub id: String,
    pub hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PushSubscription {
    pub id: String,
    pub endpoint: String,
    pub keys_p256dh: String,
    pub keys_auth: String,
    pub geohash: String,
    pub created_at: i64,
    pub updated_at: i64,
}
