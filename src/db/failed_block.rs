// Dead-letter records for heights whose sync attempts were exhausted.

use crate::models::FailedBlock;
use sqlx::{Row, SqlitePool};

pub async fn record_failed_block(
    pool: &SqlitePool,
    height: u64,
    attempts: u32,
    last_error: &str,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO failed_blocks (height, attempts, last_error, failed_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(height) DO UPDATE SET
            attempts = attempts + excluded.attempts,
            last_error = excluded.last_error,
            failed_at = excluded.failed_at",
    )
    .bind(height as i64)
    .bind(attempts as i64)
    .bind(last_error)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn clear_failed_block(pool: &SqlitePool, height: u64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM failed_blocks WHERE height = ?")
        .bind(height as i64)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_failed_blocks(pool: &SqlitePool) -> Result<Vec<FailedBlock>, sqlx::Error> {
    let rows = sqlx::query("SELECT height, attempts, last_error, failed_at FROM failed_blocks ORDER BY height ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| FailedBlock {
            height: row.get("height"),
            attempts: row.get("attempts"),
            last_error: row.get("last_error"),
            failed_at: row.get("failed_at"),
        })
        .collect())
}
