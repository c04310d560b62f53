use sqlx::SqlitePool;

/// Rebuild the database file so deleted rows no longer survive in free pages.
pub async fn vacuum(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("VACUUM").execute(pool).await?;
    Ok(())
}

/// Result row of `PRAGMA wal_checkpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub busy: bool,
    pub log_frames: i64,
    pub checkpointed_frames: i64,
}

/// Copy the write-ahead log into the main file and truncate it to zero bytes.
pub async fn checkpoint_wal(pool: &SqlitePool) -> Result<Checkpoint, sqlx::Error> {
    let (busy, log_frames, checkpointed_frames) =
        sqlx::query_as::<_, (i64, i64, i64)>("PRAGMA wal_checkpoint(TRUNCATE)")
            .fetch_one(pool)
            .await?;
    Ok(Checkpoint {
        busy: busy != 0,
        log_frames,
        checkpointed_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect, connect_memory};

    #[tokio::test]
    async fn test_vacuum_on_memory_db() {
        let pool = connect_memory().await.unwrap();
        vacuum(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_checkpoint_truncates_wal() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());

        let pool = connect(&url, 1).await.unwrap();
        crate::migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO rate_limit_hashes (id, hash, created_at) VALUES ('a', 'h', 1)")
            .execute(&pool)
            .await
            .unwrap();

        let checkpoint = checkpoint_wal(&pool).await.unwrap();
        assert!(!checkpoint.busy);
        vacuum(&pool).await.unwrap();

        pool.close().await;
    }
}
