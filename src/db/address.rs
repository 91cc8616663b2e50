use crate::models::Address;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Records that `address` appeared in a block with timestamp `seen_at`,
/// widening its first/last seen window.
pub async fn upsert_address(conn: &mut SqliteConnection, address: &str, seen_at: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO addresses (address, first_seen, last_seen) VALUES (?, ?, ?)
         ON CONFLICT(address) DO UPDATE SET
            first_seen = MIN(first_seen, excluded.first_seen),
            last_seen = MAX(last_seen, excluded.last_seen)",
    )
    .bind(address)
    .bind(seen_at)
    .bind(seen_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_address(pool: &SqlitePool, address: &str) -> Result<Option<Address>, sqlx::Error> {
    let row = sqlx::query("SELECT address, first_seen, last_seen FROM addresses WHERE address = ?")
        .bind(address)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Address {
        address: row.get("address"),
        first_seen: row.get("first_seen"),
        last_seen: row.get("last_seen"),
    }))
}

pub async fn count_addresses(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM addresses")
        .fetch_one(pool)
        .await
}
