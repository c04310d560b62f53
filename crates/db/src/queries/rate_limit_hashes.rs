use sqlx::SqlitePool;

use crate::models::RateLimitHash;

/// Newest record for `hash` created at or after `since_ms`.
pub async fn find_recent(
    pool: &SqlitePool,
    hash: &str,
    since_ms: i64,
) -> Result<Option<RateLimitHash>, sqlx::Error> {
    sqlx::query_as::<_, RateLimitHash>(
        r#"
        SELECT id, hash, created_at
        FROM rate_limit_hashes
        WHERE hash = ?1 AND created_at >= ?2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(hash)
    .bind(since_ms)
    .fetch_optional(pool)
    .await
}

pub async fn create(
    pool: &SqlitePool,
    id: &str,
    hash: &str,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO rate_limit_hashes (id, hash, created_at)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(id)
    .bind(hash)
    .bind(now_ms)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_created_before(
    pool: &SqlitePool,
    cutoff_ms: i64,
    limit: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM rate_limit_hashes
        WHERE id IN (
            SELECT id FROM rate_limit_hashes
            WHERE created_at < ?1
            ORDER BY created_at
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_memory, new_id};

    const HASH: &str = "3f8a2c1b9e7d6f5a4b3c2d1e0f9a8b7c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a";

    #[tokio::test]
    async fn test_find_recent_returns_newest_in_window() {
        let pool = connect_memory().await.unwrap();
        create(&pool, &new_id(), HASH, 1_000).await.unwrap();
        create(&pool, &new_id(), HASH, 5_000).await.unwrap();

        let found = find_recent(&pool, HASH, 500).await.unwrap().unwrap();
        assert_eq!(found.created_at, 5_000);

        assert!(find_recent(&pool, HASH, 5_001).await.unwrap().is_none());
        assert!(find_recent(&pool, "other", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_created_before() {
        let pool = connect_memory().await.unwrap();
        create(&pool, &new_id(), HASH, 1_000).await.unwrap();
        create(&pool, &new_id(), HASH, 9_000).await.unwrap();

        assert_eq!(delete_created_before(&pool, 5_000, 100).await.unwrap(), 1);
        assert!(find_recent(&pool, HASH, 0).await.unwrap().is_some());
    }
}
