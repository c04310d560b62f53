use notice_core::types::NewSubscription;
use sqlx::SqlitePool;

use crate::models::PushSubscription;

/// Insert, or refresh keys, geohash and `updated_at` for a known endpoint.
pub async fn upsert(
    pool: &SqlitePool,
    id: &str,
    subscription: &NewSubscription,
    now_ms: i64,
) -> Result<PushSubscription, sqlx::Error> {
    sqlx::query_as::<_, PushSubscription>(
        r#"
        INSERT INTO push_subscriptions
            (id, endpoint, keys_p256dh, keys_auth, geohash, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT (endpoint) DO UPDATE SET
            keys_p256dh = excluded.keys_p256dh,
            keys_auth = excluded.keys_auth,
            geohash = excluded.geohash,
            updated_at = excluded.updated_at
        RETURNING id, endpoint, keys_p256dh, keys_auth, geohash, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(&subscription.endpoint)
    .bind(&subscription.keys.p256dh)
    .bind(&subscription.keys.auth)
    .bind(&subscription.geohash)
    .bind(now_ms)
    .fetch_one(pool)
    .await
}

pub async fn delete_by_endpoint(pool: &SqlitePool, endpoint: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?1")
        .bind(endpoint)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_by_id(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list_by_geohash_prefix(
    pool: &SqlitePool,
    prefix: &str,
    limit: i64,
) -> Result<Vec<PushSubscription>, sqlx::Error> {
    sqlx::query_as::<_, PushSubscription>(
        r#"
        SELECT id, endpoint, keys_p256dh, keys_auth, geohash, created_at, updated_at
        FROM push_subscriptions
        WHERE geohash LIKE ?1 || '%'
        LIMIT ?2
        "#,
    )
    .bind(prefix)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn delete_updated_before(
    pool: &SqlitePool,
    cutoff_ms: i64,
    limit: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM push_subscriptions
        WHERE id IN (
            SELECT id FROM push_subscriptions
            WHERE updated_at < ?1
            ORDER BY updated_at
            LIMIT ?2
        )
        "#,
    )
    .bind(cutoff_ms)
    .bind(limit)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
