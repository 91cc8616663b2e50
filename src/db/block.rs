use crate::models::Block;
use sqlx::{Row, SqlitePool};

/// Highest persisted block height, or 0 for an empty ledger.
pub async fn last_indexed_height(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let height: Option<i64> = sqlx::query_scalar("SELECT MAX(height) FROM blocks")
        .fetch_one(pool)
        .await?;

    Ok(height.unwrap_or(0).max(0) as u64)
}

/// Inserts the block unless its height is already stored.
pub async fn save_block(pool: &SqlitePool, block: &Block) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO blocks (height, hash, timestamp) VALUES (?, ?, ?)
         ON CONFLICT(height) DO NOTHING",
    )
    .bind(block.height)
    .bind(&block.hash)
    .bind(block.timestamp)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_block(pool: &SqlitePool, height: u64) -> Result<Option<Block>, sqlx::Error> {
    let row = sqlx::query("SELECT height, hash, timestamp FROM blocks WHERE height = ?")
        .bind(height as i64)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Block {
        height: row.get("height"),
        hash: row.get("hash"),
        timestamp: row.get("timestamp"),
    }))
}

pub async fn get_block_hash(pool: &SqlitePool, height: u64) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT hash FROM blocks WHERE height = ?")
        .bind(height as i64)
        .fetch_optional(pool)
        .await
}

/// Drops every block at or above `height`; their transactions, inputs and
/// outputs go with them through the cascading foreign keys.
pub async fn delete_blocks_from(pool: &SqlitePool, height: u64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM blocks WHERE height >= ?")
        .bind(height as i64)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_blocks(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM blocks")
        .fetch_one(pool)
        .await
}
