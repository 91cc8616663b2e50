use crate::blockchain::client::RpcError;
use crate::blockchain::models::RpcBlock;
use crate::blockchain::processor::{self, ProjectionError};
use crate::db::{self, block, failed_block, transaction};
use crate::models::Block;
use crate::state::AppState;
use backon::{ExponentialBuilder, Retryable};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to persist transaction {txid}: {source}")]
    Persist {
        txid: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{0}")]
    Projection(#[from] ProjectionError),

    #[error("Node returned block {got} when asked for height {expected}")]
    HeightMismatch { expected: u64, got: u64 },

    #[error("Chain reorganization detected, ledger diverges from height {fork_height}")]
    Reorg { fork_height: u64 },

    #[error("Giving up on height {height} after {attempts} attempts: {last_error}")]
    Exhausted {
        height: u64,
        attempts: u32,
        last_error: String,
    },
}

impl SyncError {
    fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::Reorg { .. } | SyncError::Exhausted { .. })
    }
}

/// Ingests exactly one height.
///
/// A failed attempt is abandoned whole and the height is retried from the
/// start with exponential backoff. Once the attempt budget is spent the
/// height is recorded in `failed_blocks` and [`SyncError::Exhausted`] is
/// returned. A detected reorg is returned immediately.
pub async fn sync_block(state: &AppState, height: u64) -> Result<usize, SyncError> {
    let settings = &state.config.sync;
    let max_retries = match settings.block_max_attempts {
        0 => usize::MAX,
        attempts => attempts - 1,
    };

    let policy = ExponentialBuilder::default()
        .with_min_delay(settings.block_retry_delay)
        .with_max_delay(settings.block_retry_max_delay)
        .with_max_times(max_retries);

    let attempts = AtomicU32::new(0);

    let result = (|| {
        attempts.fetch_add(1, Ordering::Relaxed);
        attempt_block(state, height)
    })
    .retry(policy)
    .when(SyncError::is_retryable)
    .notify(|err, delay| warn!("Failed to sync block {}: {}; retrying in {:?}", height, err, delay))
    .await;

    match result {
        Ok(count) => {
            if failed_block::clear_failed_block(&state.db_pool, height).await? {
                info!("Height {} recovered from the failed block list", height);
            }
            Ok(count)
        }
        Err(err) if err.is_retryable() => {
            let attempts = attempts.load(Ordering::Relaxed);
            let last_error = err.to_string();
            error!("Giving up on block {} after {} attempts: {}", height, attempts, last_error);

            failed_block::record_failed_block(&state.db_pool, height, attempts, &last_error).await?;

            Err(SyncError::Exhausted {
                height,
                attempts,
                last_error,
            })
        }
        Err(err) => Err(err),
    }
}

/// Resolve hash, fetch body, persist block, persist each transaction in order.
async fn attempt_block(state: &AppState, height: u64) -> Result<usize, SyncError> {
    let hash = state.chain.get_block_hash(height).await?;
    let rpc_block = state.chain.get_block(&hash).await?;

    if rpc_block.height != height {
        return Err(SyncError::HeightMismatch {
            expected: height,
            got: rpc_block.height,
        });
    }

    check_continuity(state, height, &rpc_block).await?;

    let header = Block {
        height: height as i64,
        hash: rpc_block.hash.clone(),
        timestamp: rpc_block.time,
    };

    if block::save_block(&state.db_pool, &header).await? {
        debug!("Stored block {} ({})", height, header.hash);
    }

    for (index, raw) in rpc_block.tx.iter().enumerate() {
        let projected = processor::project(raw, &header, index)?;
        let txid = projected.transaction.txid.clone();

        db::with_transaction(&state.db_pool, move |conn| {
            Box::pin(async move { transaction::save_projected(conn, &projected).await })
        })
        .await
        .map_err(|source| SyncError::Persist { txid, source })?;
    }

    Ok(rpc_block.tx.len())
}

/// Fails with [`SyncError::Reorg`] when the stored chain no longer lines up
/// with the block the node returned.
async fn check_continuity(state: &AppState, height: u64, rpc_block: &RpcBlock) -> Result<(), SyncError> {
    if let Some(stored) = block::get_block_hash(&state.db_pool, height).await? {
        if stored != rpc_block.hash {
            warn!(
                "Stored hash {} at height {} differs from node hash {}",
                stored, height, rpc_block.hash
            );
            return Err(SyncError::Reorg { fork_height: height });
        }
    }

    if height == 0 {
        return Ok(());
    }

    let parent = block::get_block_hash(&state.db_pool, height - 1).await?;
    match (parent, rpc_block.previous_block_hash.as_deref()) {
        (Some(stored_parent), Some(expected)) if stored_parent != expected => {
            warn!(
                "Block {} builds on {} but the ledger holds {} at height {}",
                height,
                expected,
                stored_parent,
                height - 1
            );
            Err(SyncError::Reorg {
                fork_height: height - 1,
            })
        }
        _ => Ok(()),
    }
}
