use notice_core::types::{NewReport, ReportType};
use sqlx::SqlitePool;

use crate::models::Report;

/// Insert a validated report. The description is stored trimmed, or NULL
/// when blank.
pub async fn create(
    pool: &SqlitePool,
    id: &str,
    kind: ReportType,
    report: &NewReport,
    now_ms: i64,
) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (id, geohash, kind, description, lat, long, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        RETURNING id, geohash, kind, description, lat, long, confirmations, disputes,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(&report.geohash)
    .bind(kind.as_str())
    .bind(report.normalized_description())
    .bind(report.lat)
    .bind(report.long)
    .bind(now_ms)
    .fetch_one(pool)
    .await
}

/// Newest first. `prefix` narrows to geohashes starting with it.
pub async fn list_recent(
    pool: &SqlitePool,
    prefix: Option<&str>,
    since_ms: i64,
    limit: i64,
) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        SELECT id, geohash, kind, description, lat, long, confirmations, disputes,
               created_at, updated_at
        FROM reports
        WHERE created_at >= ?1
          AND (?2 IS NULL OR geohash LIKE ?2 || '%')
        ORDER BY created_at DESC
        LIMIT ?3
        "#,
    )
    .bind(since_ms)
    .bind(prefix)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn add_confirmation(
    pool: &SqlitePool,
    id: &str,
    now_ms: i64,
) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports
        SET confirmations = confirmations + 1, updated_at = ?2
        WHERE id = ?1
        RETURNING id, geohash, kind, description, lat, long, confirmations, disputes,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(now_ms)
    .fetch_optional(pool)
    .await
}

pub async fn add_dispute(
    pool: &SqlitePool,
    id: &str,
    now_ms: i64,
) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports
        SET disputes = disputes + 1, updated_at = ?2
        WHERE id = ?1
        RETURNING id, geohash, kind, description, lat, long, confirmations, disputes,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(now_ms)
    .fetch_optional(pool)
    .await
}

pub async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reports").execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn delete_created_before(
    pool: &SqlitePool,
    cutoff_ms: i64,
    limit: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM reports
        WHERE id IN (
            SELECT id FROM reports
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
