pub mod address;
pub mod block;
pub mod connection;
pub mod failed_block;
pub mod migration;
pub mod transaction;

use futures::future::BoxFuture;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;

/// Runs `f` as one unit of work on a pooled connection.
///
/// Everything `f` writes through the connection it is handed commits together
/// when it returns `Ok`, and is rolled back when it returns `Err`. The
/// connection goes back to the pool either way.
pub async fn with_transaction<T, E, F>(pool: &SqlitePool, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>>,
    E: From<sqlx::Error>,
{
    let mut tx = pool.begin().await?;

    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
