use crate::db::address;
use crate::models::{Input, Output, ProjectedTransaction, Transaction, TxType};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Writes one projected transaction: its row, inputs, outputs and address
/// markers. Every insert is a no-op when the row already exists, so replaying
/// a transaction leaves the ledger unchanged.
///
/// Meant to run inside [`crate::db::with_transaction`].
pub async fn save_projected(
    conn: &mut SqliteConnection,
    projected: &ProjectedTransaction,
) -> Result<(), sqlx::Error> {
    insert_transaction(conn, &projected.transaction).await?;

    for input in &projected.inputs {
        insert_input(conn, input).await?;
    }

    for output in &projected.outputs {
        insert_output(conn, output).await?;
    }

    for addr in projected.addresses() {
        address::upsert_address(conn, addr, projected.seen_at).await?;
    }

    Ok(())
}

pub async fn insert_transaction(conn: &mut SqliteConnection, transaction: &Transaction) -> Result<bool, sqlx::Error> {
    let raw = transaction.raw.to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO transactions
        (txid, block_height, version, locktime, fee, tx_type, is_shielded, raw)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(txid) DO NOTHING
        "#,
    )
    .bind(&transaction.txid)
    .bind(transaction.block_height)
    .bind(transaction.version)
    .bind(transaction.locktime)
    .bind(transaction.fee)
    .bind(transaction.tx_type.as_str())
    .bind(transaction.is_shielded)
    .bind(raw)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_input(conn: &mut SqliteConnection, input: &Input) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO inputs (txid, prev_txid, prev_vout, address, value)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(txid, prev_txid, prev_vout) DO NOTHING
        "#,
    )
    .bind(&input.txid)
    .bind(&input.prev_txid)
    .bind(input.prev_vout)
    .bind(&input.address)
    .bind(input.value)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_output(conn: &mut SqliteConnection, output: &Output) -> Result<bool, sqlx::Error> {
    let script_pub_key = output.script_pub_key.to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO outputs (txid, vout_index, value, scriptpubkey, script_pub_key, address)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(txid, vout_index) DO NOTHING
        "#,
    )
    .bind(&output.txid)
    .bind(output.vout_index)
    .bind(output.value)
    .bind(&output.scriptpubkey)
    .bind(script_pub_key)
    .bind(&output.address)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_transaction(pool: &SqlitePool, txid: &str) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT txid, block_height, version, locktime, fee, tx_type, is_shielded, raw
           FROM transactions WHERE txid = ?"#,
    )
    .bind(txid)
    .fetch_optional(pool)
    .await?;

    row.map(|row| transaction_from_row(&row)).transpose()
}

pub async fn get_transactions_for_block(pool: &SqlitePool, height: u64) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT txid, block_height, version, locktime, fee, tx_type, is_shielded, raw
           FROM transactions WHERE block_height = ?
           ORDER BY rowid ASC"#,
    )
    .bind(height as i64)
    .fetch_all(pool)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}

pub async fn get_inputs(pool: &SqlitePool, txid: &str) -> Result<Vec<Input>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT txid, prev_txid, prev_vout, address, value
           FROM inputs WHERE txid = ? ORDER BY id ASC"#,
    )
    .bind(txid)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Input {
            txid: row.get("txid"),
            prev_txid: row.get("prev_txid"),
            prev_vout: row.get("prev_vout"),
            address: row.get("address"),
            value: row.get("value"),
        })
        .collect())
}

pub async fn get_outputs(pool: &SqlitePool, txid: &str) -> Result<Vec<Output>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT txid, vout_index, value, scriptpubkey, script_pub_key, address
           FROM outputs WHERE txid = ? ORDER BY vout_index ASC"#,
    )
    .bind(txid)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Output {
                txid: row.get("txid"),
                vout_index: row.get("vout_index"),
                value: row.get("value"),
                scriptpubkey: row.get("scriptpubkey"),
                script_pub_key: decode_json(row.get("script_pub_key"))?,
                address: row.get("address"),
            })
        })
        .collect()
}

pub async fn count_transactions(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await
}

pub async fn count_inputs(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM inputs")
        .fetch_one(pool)
        .await
}

pub async fn count_outputs(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM outputs")
        .fetch_one(pool)
        .await
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    let tx_type: String = row.get("tx_type");
    let tx_type = TxType::parse(&tx_type).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "tx_type".to_string(),
        source: format!("unknown transaction type {:?}", tx_type).into(),
    })?;

    Ok(Transaction {
        txid: row.get("txid"),
        block_height: row.get("block_height"),
        version: row.get("version"),
        locktime: row.get("locktime"),
        fee: row.get("fee"),
        tx_type,
        is_shielded: row.get("is_shielded"),
        raw: decode_json(row.get("raw"))?,
    })
}

fn decode_json(text: String) -> Result<Value, sqlx::Error> {
    serde_json::from_str(&text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
