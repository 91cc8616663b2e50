use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS blocks (
            height INTEGER PRIMARY KEY,
            hash TEXT NOT NULL UNIQUE,
            timestamp INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transactions (
            txid TEXT PRIMARY KEY,
            block_height INTEGER NOT NULL,
            version INTEGER NOT NULL,
            locktime INTEGER NOT NULL,
            fee REAL NOT NULL,
            tx_type TEXT NOT NULL CHECK (tx_type IN ('reward', 'shielded', 'transfer')),
            is_shielded BOOLEAN NOT NULL DEFAULT 0,
            raw TEXT NOT NULL,
            FOREIGN KEY (block_height) REFERENCES blocks(height) ON DELETE CASCADE
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            txid TEXT NOT NULL,
            prev_txid TEXT NOT NULL,
            prev_vout INTEGER NOT NULL,
            address TEXT,
            value REAL NOT NULL DEFAULT 0,
            UNIQUE (txid, prev_txid, prev_vout),
            FOREIGN KEY (txid) REFERENCES transactions(txid) ON DELETE CASCADE
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS outputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            txid TEXT NOT NULL,
            vout_index INTEGER NOT NULL,
            value REAL NOT NULL DEFAULT 0,
            scriptpubkey TEXT NOT NULL,
            script_pub_key JSON NOT NULL,
            address TEXT,
            UNIQUE (txid, vout_index),
            FOREIGN KEY (txid) REFERENCES transactions(txid) ON DELETE CASCADE
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS addresses (
            address TEXT PRIMARY KEY,
            first_seen INTEGER NOT NULL,
            last_seen INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // Heights that exhausted their retry budget
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS failed_blocks (
            height INTEGER PRIMARY KEY,
            attempts INTEGER NOT NULL,
            last_error TEXT NOT NULL,
            failed_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_block_height ON transactions(block_height)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_inputs_address ON inputs(address)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_outputs_address ON outputs(address)")
        .execute(pool)
        .await?;

    info!("Database migrations completed successfully");
    Ok(())
}
